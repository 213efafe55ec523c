#![allow(dead_code)]

mod alerts;
mod caches;
mod config;
mod detectors;
mod events;
mod feeds;
mod models;
mod paper;
mod pipeline;
mod pricing;
mod quality;
mod report;
mod strategy;

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::alerts::{
    AlertDispatcher, AlertTransport, DispatcherConfig, LogTransport, SignalRateLimiter,
    TelegramTransport,
};
use crate::config::Config;
use crate::events::EventBus;
use crate::feeds::CryptoTickerFeed;
use crate::models::paper::Direction;
use crate::paper::PaperTradingEngine;
use crate::pipeline::AnomalyPipeline;
use crate::strategy::{AutoBetConfig, AutoBetStrategist, LoggingOrderClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("================================================");
    info!("  POLYSENTRY — prediction market analytics v0.1.0");
    info!("================================================");

    let config = Config::load_or_default();
    config.validate()?;

    if config.is_dry_run() {
        warn!("no chat credentials configured — alerts go to the log");
    }

    // Shutdown signal for every background task.
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // === Event topics ===
    let bus = Arc::new(EventBus::default());

    // === Core components ===
    let paper = Arc::new(PaperTradingEngine::load_or_new(
        config.paper.starting_balance,
        config.paper.trades_file.clone(),
    ));
    info!("paper balance: {}", paper.balance().await);

    let pipeline = Arc::new(AnomalyPipeline::new(bus.anomalies.clone()));

    let transport: Arc<dyn AlertTransport> = match (&config.telegram.bot_token, &config.telegram.chat_id)
    {
        (Some(token), Some(chat_id)) => {
            Arc::new(TelegramTransport::new(token.clone(), chat_id.clone()))
        }
        _ => Arc::new(LogTransport),
    };

    let dispatcher = Arc::new(AlertDispatcher::new(
        DispatcherConfig {
            min_severity: config.alerting.min_severity,
            dedup_minutes: config.alerting.dedup_minutes,
            max_alerts_per_minute: config.alerting.max_alerts_per_minute,
            market_url_base: config.alerting.market_url_base.clone(),
        },
        SignalRateLimiter::load_or_new(config.alerting.rate_limit_file.clone()),
        paper.clone(),
        pipeline.resolver.clone(),
        transport.clone(),
    ));

    let strategist = Arc::new(AutoBetStrategist::new(
        AutoBetConfig {
            enabled: config.auto_bet.enabled,
            min_quality: config.auto_bet.min_quality,
            min_severity: config.auto_bet.min_severity,
            cooldown_minutes: config.auto_bet.cooldown_minutes,
            stake: config.auto_bet.stake,
        },
        Arc::new(LoggingOrderClient),
        bus.bets.clone(),
    ));

    // === Stream consumers: one task per event type ===

    // Market snapshots → volume spike, divergence, crypto market cache.
    {
        let mut rx = bus.snapshots.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(snapshot) => { pipeline.on_snapshot(&snapshot); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("snapshot consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // Price changes → price spike detector.
    {
        let mut rx = bus.price_changes.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(change) => { pipeline.on_price_change(&change); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("price-change consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // Large trades → whale detector.
    {
        let mut rx = bus.trades.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(trade) => { pipeline.on_trade(&trade); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("trade consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // Order books → imbalance + spread detectors.
    {
        let mut rx = bus.order_books.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(book) => { pipeline.on_order_book(&book); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("order-book consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // News → news impact detector.
    {
        let mut rx = bus.news.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(item) => { pipeline.on_news(&item); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("news consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // Crypto prices → divergence against cached crypto markets.
    {
        let mut rx = bus.crypto_prices.subscribe();
        let pipeline = pipeline.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(price) => { pipeline.on_crypto_price(&price); }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("crypto-price consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // === Anomaly fan-out: alert dispatcher ===
    {
        let mut rx = bus.anomalies.subscribe();
        let dispatcher = dispatcher.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(anomaly) => dispatcher.dispatch(&anomaly).await,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("alert consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // === Anomaly fan-out: auto-bet strategist ===
    {
        let mut rx = bus.anomalies.subscribe();
        let strategist = strategist.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(anomaly) => { strategist.on_anomaly(&anomaly).await; }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("auto-bet consumer lagged by {n}");
                        }
                        Err(_) => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // === Position tracker: drive stops / takes / resolution from snapshots ===
    {
        let mut rx = bus.snapshots.subscribe();
        let paper = paper.clone();
        let mut shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => {
                        let snapshot = match event {
                            Ok(s) => s,
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!("position tracker lagged by {n}");
                                continue;
                            }
                            Err(_) => break,
                        };

                        let open = paper.open_positions().await;
                        let Some(position) = open.iter().find(|p| p.market_id == snapshot.market_id) else {
                            continue;
                        };

                        // Resolution first: a market pinned at the boundary settles.
                        if snapshot.yes_price >= 0.99 || snapshot.yes_price <= 0.01 {
                            let yes_won = snapshot.yes_price >= 0.99;
                            let won = match position.direction {
                                Direction::Yes => yes_won,
                                Direction::No => !yes_won,
                            };
                            paper.close_at_resolution(&snapshot.market_id, won).await;
                            continue;
                        }

                        let current = match position.direction {
                            Direction::Yes => snapshot.yes_price,
                            Direction::No => snapshot.no_price,
                        };
                        if let Some(price) = Decimal::from_f64_retain(current) {
                            paper
                                .check_and_close(&snapshot.market_id, price.round_dp(4), None)
                                .await;
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
    }

    // === Background producers ===
    let crypto_feed = CryptoTickerFeed::new(config.crypto_feed.clone(), bus.crypto_prices.clone());
    crypto_feed.start(shutdown_tx.subscribe());
    info!("crypto ticker feed started");

    report::spawn_daily_report_loop(paper.clone(), transport.clone(), shutdown_tx.subscribe());

    info!("=== POLYSENTRY running ===");
    info!("consumers active: snapshots, prices, trades, books, news, crypto; alerting + auto-bet");
    info!("Press Ctrl+C to shutdown.");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(());

    // State files are written on every mutation; nothing else to flush.
    let report = paper.daily_report().await;
    info!("final report:\n{}", report::format_daily_report(&report));

    info!("POLYSENTRY shutdown complete.");
    Ok(())
}
