//! lyceum-bot — Telegram-бот ліцею: розклад уроків і дзвінків, AI-помічник,
//! донати та адмін-панель.

mod admins;
mod ai;
mod bot;
mod config;
mod health;
mod schedule;
mod session;
mod stats;

use std::path::PathBuf;
use teloxide::dispatching::Dispatcher;
use teloxide::prelude::*;

const CONFIG_ENV: &str = "BOT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "bot.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    tracing::info!("Starting lyceum-bot with config {}", config_path.display());

    let config = config::Config::load(&config_path)?;
    let token = config.bot_token()?;
    let api_key = config.ai_api_key()?;
    let health_port = config.health_port()?;
    tracing::info!(
        school_name = %config.school_name,
        schedule_path = %config.schedule_path.display(),
        admins_path = %config.admins_path.display(),
        ai_model = %config.ai.model,
        health_port = ?health_port,
        "Configuration loaded"
    );

    let schedule = schedule::ScheduleStore::load(
        schedule::SchedulePaths {
            main: config.schedule_path.clone(),
            elementary: config.elementary_schedule_path.clone(),
            bells: config.bells_path.clone(),
        },
        &config.shifts.second_shift_classes,
    );
    let admins = admins::AdminStore::open(
        &config.admins_path,
        &config.bootstrap_admin_ids,
        config.bootstrap_password.as_deref(),
        config.limits.min_password_len,
    )?;
    let instructions = ai::instructions::InstructionStore::open(&config.instructions_path)?;
    let ai = ai::AiGateway::new(&config.ai, api_key, instructions)?;
    tracing::info!(
        classes = schedule.classes().len(),
        admin_count = admins.admin_ids().len(),
        donors = admins.donor_count(),
        "Stores loaded"
    );

    if let Some(port) = health_port {
        let listener = health::bind(port).await?;
        tokio::spawn(health::serve(listener));
    }

    let bot = Bot::new(token);
    if let Err(error) = bot.set_my_commands(bot::handlers::bot_commands()).await {
        tracing::warn!(error = %error, "Could not register bot commands");
    }

    let state = bot::handlers::BotState::new(config, schedule, admins, ai);
    tracing::info!("Dispatcher initialized, bot is ready");

    Dispatcher::builder(bot, bot::handlers::schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
