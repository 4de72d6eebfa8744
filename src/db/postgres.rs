//! Postgres-backed persistence for triggers and signals.
//!
//! The in-memory arenas stay authoritative for the state machine; this
//! mirror makes state survive restarts. Rows are upserted on every
//! transition and loaded once at startup.

use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls, Row};

use crate::models::decision::{TriggerDirection, TriggerKind};
use crate::models::signal::{Signal, SignalOrigin, SignalOutcome, SignalStatus, TradeDirection};
use crate::models::snapshot::Timeframe;
use crate::models::trigger::{Trigger, TriggerStatus};

type DbError = Box<dyn std::error::Error + Send + Sync>;

pub struct Database {
    client: Arc<RwLock<Option<Client>>>,
}

impl Database {
    pub async fn new(url: &str) -> Result<Self, DbError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await.map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("failed to connect to database: {e}"),
            )) as DbError
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "database connection error");
            }
        });

        let db = Self {
            client: Arc::new(RwLock::new(Some(client))),
        };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), DbError> {
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        c.execute(
            "CREATE TABLE IF NOT EXISTS triggers (
                id BIGINT PRIMARY KEY,
                symbol TEXT NOT NULL,
                kind TEXT NOT NULL,
                level DOUBLE PRECISION NOT NULL,
                direction TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                context_note TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                status TEXT NOT NULL,
                fired_at TIMESTAMPTZ,
                fire_reason TEXT,
                resolved_at TIMESTAMPTZ
            )",
            &[],
        )
        .await?;

        c.execute(
            "CREATE INDEX IF NOT EXISTS idx_triggers_symbol_status
             ON triggers(symbol, status)",
            &[],
        )
        .await?;

        c.execute(
            "CREATE TABLE IF NOT EXISTS signals (
                id BIGINT PRIMARY KEY,
                symbol TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry DOUBLE PRECISION NOT NULL,
                original_stop DOUBLE PRECISION NOT NULL,
                current_stop DOUBLE PRECISION NOT NULL,
                target DOUBLE PRECISION NOT NULL,
                reasoning TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL,
                origin TEXT NOT NULL,
                trigger_id BIGINT,
                status TEXT NOT NULL,
                breakeven_at TIMESTAMPTZ,
                outcome TEXT,
                exit_price DOUBLE PRECISION,
                pnl_pips DOUBLE PRECISION,
                closed_at TIMESTAMPTZ
            )",
            &[],
        )
        .await?;

        Ok(())
    }

    pub async fn upsert_trigger(&self, trigger: &Trigger) -> Result<(), DbError> {
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        c.execute(
            "INSERT INTO triggers
                (id, symbol, kind, level, direction, timeframe, description,
                 context_note, created_at, expires_at, status, fired_at,
                 fire_reason, resolved_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                fired_at = EXCLUDED.fired_at,
                fire_reason = EXCLUDED.fire_reason,
                resolved_at = EXCLUDED.resolved_at",
            &[
                &trigger.id,
                &trigger.symbol,
                &trigger.kind.label(),
                &trigger.level,
                &direction_str(trigger.direction),
                &trigger.timeframe.label(),
                &trigger.description,
                &trigger.context_note,
                &trigger.created_at,
                &trigger.expires_at,
                &trigger.status.as_str(),
                &trigger.fired_at,
                &trigger.fire_reason,
                &trigger.resolved_at,
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn insert_signal(&self, signal: &Signal) -> Result<(), DbError> {
        let id = signal.id.ok_or("signal has no id assigned")?;
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        c.execute(
            "INSERT INTO signals
                (id, symbol, direction, entry, original_stop, current_stop,
                 target, reasoning, created_at, origin, trigger_id, status,
                 breakeven_at, outcome, exit_price, pnl_pips, closed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                     $13, $14, $15, $16, $17)
             ON CONFLICT (id) DO NOTHING",
            &[
                &id,
                &signal.symbol,
                &signal.direction.as_str(),
                &signal.entry,
                &signal.original_stop,
                &signal.current_stop,
                &signal.target,
                &signal.reasoning,
                &signal.created_at,
                &signal.origin.as_str(),
                &signal.trigger_id,
                &signal.status.as_str(),
                &signal.breakeven_at,
                &signal.outcome.map(|o| o.as_str()),
                &signal.exit_price,
                &signal.pnl_pips,
                &signal.closed_at,
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn update_signal(&self, signal: &Signal) -> Result<(), DbError> {
        let id = signal.id.ok_or("signal has no id assigned")?;
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        c.execute(
            "UPDATE signals SET
                current_stop = $2, status = $3, breakeven_at = $4,
                outcome = $5, exit_price = $6, pnl_pips = $7, closed_at = $8
             WHERE id = $1",
            &[
                &id,
                &signal.current_stop,
                &signal.status.as_str(),
                &signal.breakeven_at,
                &signal.outcome.map(|o| o.as_str()),
                &signal.exit_price,
                &signal.pnl_pips,
                &signal.closed_at,
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn load_triggers(&self) -> Result<Vec<Trigger>, DbError> {
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        let rows = c
            .query("SELECT * FROM triggers ORDER BY id", &[])
            .await?;
        rows.iter().map(trigger_from_row).collect()
    }

    pub async fn load_signals(&self) -> Result<Vec<Signal>, DbError> {
        let client = self.client.read().await;
        let Some(ref c) = *client else {
            return Err("database not connected".into());
        };

        let rows = c.query("SELECT * FROM signals ORDER BY id", &[]).await?;
        rows.iter().map(signal_from_row).collect()
    }
}

fn direction_str(direction: TriggerDirection) -> &'static str {
    match direction {
        TriggerDirection::Bullish => "bullish",
        TriggerDirection::Bearish => "bearish",
    }
}

fn parse_kind(s: &str) -> Result<TriggerKind, DbError> {
    match s {
        "level_break" => Ok(TriggerKind::LevelBreak),
        "retest_hold" => Ok(TriggerKind::RetestHold),
        "range_edge_reject" => Ok(TriggerKind::RangeEdgeReject),
        "ema_retouch" => Ok(TriggerKind::EmaRetouch),
        other => Err(format!("unknown trigger kind: {other}").into()),
    }
}

fn parse_direction(s: &str) -> Result<TriggerDirection, DbError> {
    match s {
        "bullish" => Ok(TriggerDirection::Bullish),
        "bearish" => Ok(TriggerDirection::Bearish),
        other => Err(format!("unknown trigger direction: {other}").into()),
    }
}

fn parse_timeframe(s: &str) -> Result<Timeframe, DbError> {
    match s {
        "H4" => Ok(Timeframe::H4),
        "H1" => Ok(Timeframe::H1),
        "M15" => Ok(Timeframe::M15),
        other => Err(format!("unknown timeframe: {other}").into()),
    }
}

fn parse_trade_direction(s: &str) -> Result<TradeDirection, DbError> {
    match s {
        "BUY" => Ok(TradeDirection::Buy),
        "SELL" => Ok(TradeDirection::Sell),
        other => Err(format!("unknown trade direction: {other}").into()),
    }
}

fn parse_origin(s: &str) -> Result<SignalOrigin, DbError> {
    match s {
        "direct" => Ok(SignalOrigin::Direct),
        "trigger-conversion" => Ok(SignalOrigin::TriggerConversion),
        other => Err(format!("unknown signal origin: {other}").into()),
    }
}

fn parse_outcome(s: &str) -> Result<SignalOutcome, DbError> {
    match s {
        "WIN" => Ok(SignalOutcome::Win),
        "LOSS" => Ok(SignalOutcome::Loss),
        "BREAKEVEN" => Ok(SignalOutcome::Breakeven),
        other => Err(format!("unknown signal outcome: {other}").into()),
    }
}

fn trigger_from_row(row: &Row) -> Result<Trigger, DbError> {
    Ok(Trigger {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        kind: parse_kind(row.try_get::<_, String>("kind")?.as_str())?,
        level: row.try_get("level")?,
        direction: parse_direction(row.try_get::<_, String>("direction")?.as_str())?,
        timeframe: parse_timeframe(row.try_get::<_, String>("timeframe")?.as_str())?,
        description: row.try_get("description")?,
        context_note: row.try_get("context_note")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
        status: TriggerStatus::from_str(row.try_get::<_, String>("status")?.as_str())?,
        fired_at: row.try_get("fired_at")?,
        fire_reason: row.try_get("fire_reason")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

fn signal_from_row(row: &Row) -> Result<Signal, DbError> {
    let outcome: Option<String> = row.try_get("outcome")?;
    Ok(Signal {
        id: Some(row.try_get("id")?),
        symbol: row.try_get("symbol")?,
        direction: parse_trade_direction(row.try_get::<_, String>("direction")?.as_str())?,
        entry: row.try_get("entry")?,
        original_stop: row.try_get("original_stop")?,
        current_stop: row.try_get("current_stop")?,
        target: row.try_get("target")?,
        reasoning: row.try_get("reasoning")?,
        created_at: row.try_get("created_at")?,
        origin: parse_origin(row.try_get::<_, String>("origin")?.as_str())?,
        trigger_id: row.try_get("trigger_id")?,
        status: SignalStatus::from_str(row.try_get::<_, String>("status")?.as_str())?,
        breakeven_at: row.try_get("breakeven_at")?,
        outcome: outcome.as_deref().map(parse_outcome).transpose()?,
        exit_price: row.try_get("exit_price")?,
        pnl_pips: row.try_get("pnl_pips")?,
        closed_at: row.try_get("closed_at")?,
    })
}
