mod agent;
mod core;
mod movement;
mod targeting;
#[cfg(test)]
mod testing;
mod transport;

use crate::agent::Agent;
use crate::core::{AgentConfig, AgentError, ArenaConfig, TransportError};
use crate::transport::{NetworkConfig, Transport, UdpTransport};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::future::Future;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Структура для зчитування зовнішньої конфігурації.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    network: NetworkConfig,
    agent: AgentConfig,
}

/// Автономний агент для арени NetBots.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Файл налаштувань (необов'язковий)
    #[arg(short, long, default_value = "Settings.toml")]
    config: PathBuf,
    /// Власна IP-адреса
    #[arg(long)]
    ip: Option<IpAddr>,
    /// Власний порт
    #[arg(short, long)]
    port: Option<u16>,
    /// IP-адреса сервера
    #[arg(long)]
    server_ip: Option<IpAddr>,
    /// Порт сервера
    #[arg(long)]
    server_port: Option<u16>,
    /// Ім'я агента на арені
    #[arg(long)]
    name: Option<String>,
    /// Стратегія: circler або scaredy_cat
    #[arg(long)]
    strategy: Option<String>,
    /// Друкувати повідомлення рівня DEBUG (включає --verbose)
    #[arg(long)]
    debug: bool,
    /// Друкувати докладні повідомлення
    #[arg(long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let settings = config::Config::builder()
        .add_source(config::File::from(args.config.as_path()).required(false))
        .add_source(
            config::Environment::with_prefix("ARENA")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("network.bind_ip", args.ip.map(|ip| ip.to_string()))?
        .set_override_option("network.bind_port", args.port.map(i64::from))?
        .set_override_option("network.server_ip", args.server_ip.map(|ip| ip.to_string()))?
        .set_override_option("network.server_port", args.server_port.map(i64::from))?
        .set_override_option("agent.name", args.name.clone())?
        .set_override_option("agent.strategy", args.strategy.clone())?
        .build()
        .with_context(|| format!("Пошкоджено файл налаштувань {}", args.config.display()))?;

    settings
        .try_deserialize()
        .context("Некоректні значення в налаштуваннях")
}

/// Приєднання, яке можна перервати. `None` означає, що сигнал надійшов раніше.
async fn join_until<T: Transport, S: Future>(
    transport: &mut T,
    name: &str,
    shutdown: S,
) -> Option<Result<ArenaConfig, TransportError>> {
    tokio::select! {
        biased;
        _ = shutdown => None,
        result = transport.join(name) => Some(result),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Ініціалізація структурованого логування (tracing)
    let level = if args.debug {
        Level::TRACE
    } else if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Не вдалося встановити tracing subscriber");

    // 2. Завантаження конфігурації
    let config = load_config(&args)?;
    info!(
        name = %config.agent.name,
        strategy = ?config.agent.strategy,
        "Конфігурація завантажена"
    );

    // 3. Приєднання до сервера
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let server = config.network.server_addr();
    let mut transport = UdpTransport::connect(&config.network)
        .await
        .with_context(|| format!("Не вдалося відкрити сокет {}", config.network.local_addr()))?;

    let arena = match join_until(&mut transport, &config.agent.name, &mut shutdown).await {
        Some(Ok(arena)) => arena,
        None => {
            info!("Отримано сигнал переривання під час приєднання");
            info!(stats = %transport.stats(), "Статистика обміну");
            info!("Завершення роботи");
            return Ok(());
        }
        Some(Err(err)) => {
            error!(error = %err, "Чи запущено сервер на {server}?");
            info!(stats = %transport.stats(), "Статистика обміну");
            return Err(AgentError::JoinFailed(err).into());
        }
    };
    info!("Приєднання успішне. Готові до гри!");
    debug!(?arena, "Параметри арени");

    // 4. Гра до фатальної помилки або сигналу переривання
    let mut agent = Agent::new(transport, config.agent, arena);
    let outcome = tokio::select! {
        result = agent.run() => result,
        _ = &mut shutdown => {
            info!("Отримано сигнал переривання");
            Ok(())
        }
    };

    let session = agent.session();
    info!(
        name = %session.name,
        game = session.game_number,
        points = session.points,
        "Підсумок сесії"
    );
    info!(stats = %agent.stats(), "Статистика обміну");
    info!("Завершення роботи");
    outcome.map_err(Into::into)
}
