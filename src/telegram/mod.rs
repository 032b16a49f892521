use log::error;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use teloxide::dispatching::repls::CommandReplExt;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::utils::command::BotCommands;

use crate::error::{Error, Result};
use crate::pipeline::{AnalysisPipeline, PairAnalysis, TokenAnalysis};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Greet the bot")]
    Start,
    #[command(description = "Chart and 24h stats for a pair contract address")]
    Pair(String),
    #[command(description = "Full analytics for a token contract address")]
    Ca(String),
}

pub struct AnalysisBot {
    bot: Bot,
    pipeline: Arc<AnalysisPipeline>,
}

impl AnalysisBot {
    pub fn new(bot_token: String, pipeline: Arc<AnalysisPipeline>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            pipeline,
        }
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let bot = self.bot.clone();
        let handler_instance = self.clone();
        Command::repl(bot, move |_b: Bot, msg: Message, cmd: Command| {
            let handler_instance = handler_instance.clone();
            async move {
                if let Err(e) = handler_instance.handle_command(msg, cmd).await {
                    error!("Error handling command: {}", e);
                }
                Ok(())
            }
        })
        .await;
        Ok(())
    }

    pub async fn handle_command(&self, msg: Message, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                self.bot.send_message(msg.chat.id, "Hello!").await?;
            }
            Command::Pair(address) => {
                let address = address.trim().to_string();
                if address.is_empty() {
                    self.bot
                        .send_message(msg.chat.id, "Usage: /pair <pair contract address>")
                        .await?;
                    return Ok(());
                }
                match self.pipeline.analyse_pair(&address).await {
                    Ok(analysis) => {
                        let caption = format_pair_caption(&analysis);
                        self.send_chart(msg.chat.id, analysis.image, caption).await?;
                    }
                    Err(e) => {
                        error!("/pair {} failed: {}", address, e);
                        self.bot.send_message(msg.chat.id, user_message(&e)).await?;
                    }
                }
            }
            Command::Ca(address) => {
                let address = address.trim().to_string();
                if address.is_empty() {
                    self.bot
                        .send_message(msg.chat.id, "Usage: /ca <token contract address>")
                        .await?;
                    return Ok(());
                }
                match self.pipeline.analyse_token(&address).await {
                    Ok(analysis) => {
                        let caption = format_token_caption(&analysis);
                        self.send_chart(msg.chat.id, analysis.image, caption).await?;
                    }
                    Err(e) => {
                        error!("/ca {} failed: {}", address, e);
                        self.bot.send_message(msg.chat.id, user_message(&e)).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn send_chart(&self, chat_id: ChatId, image: Vec<u8>, caption: String) -> Result<()> {
        self.bot
            .send_photo(chat_id, InputFile::memory(image).file_name("graph.jpg"))
            .caption(caption)
            .await?;
        Ok(())
    }
}

/// Human-scale dollar formatting with K/M/B suffixes.
fn format_usd(value: f64) -> String {
    let suffixes = ["", "K", "M", "B"];
    let mut value = value;
    let mut idx = 0;
    while value.abs() >= 1000.0 && idx < suffixes.len() - 1 {
        value /= 1000.0;
        idx += 1;
    }
    format!("${:.2}{}", value, suffixes[idx])
}

fn format_usd_decimal(value: Decimal) -> String {
    format_usd(value.to_f64().unwrap_or(0.0))
}

fn format_pair_caption(analysis: &PairAnalysis) -> String {
    let stats = &analysis.stats_24h;
    format!(
        "📊 Volume (24h): {}\n\
         📈 Buy Volume (24h): {}\n\
         📉 Sell Volume (24h): {}\n\
         🔄 Transactions (24h): {}\n\
         📈 Buy Transactions (24h): {}\n\
         📉 Sell Transactions (24h): {}\n\
         🔝 Peak Price: {:.2e} $ at {}",
        format_usd(stats.volume),
        format_usd(stats.buy_volume),
        format_usd(stats.sell_volume),
        stats.transactions,
        stats.buy_transactions,
        stats.sell_transactions,
        analysis.peak_price,
        analysis.peak_price_time.format("%Y-%m-%d %H:%M"),
    )
}

fn format_token_caption(analysis: &TokenAnalysis) -> String {
    let report = &analysis.report;
    let trends = report
        .trends
        .iter()
        .map(|(label, value)| format!("{} trend: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n");

    let stats = &report.stats_24h;
    let liquidity = match report.liquidity_usd {
        Some(value) => format_usd_decimal(value),
        None => "n/a".to_string(),
    };

    format!(
        "📈 Trends:\n{}\n\n\
         📊 24h Stats:\n\
         📊 Volume: {}\n\
         📈 Buy volume: {}\n\
         📉 Sell volume: {}\n\
         🔄 Transactions: {}\n\
         📈 Buy transactions: {}\n\
         📉 Sell transactions: {}\n\
         🔝 Peak price: {}\n\
         🔝 Peak mcap: {}\n\
         🔻 Low price: {}\n\
         🔻 Low mcap: {}\n\n\
         🔝 Peak Price (All Time): {} at {}\n\
         🔝 Peak Mcap (All Time): {}\n\n\
         💰 Current Price: {}\n\
         💼 Market Cap: {}\n\n\
         💧 Liquidity: {}",
        trends,
        format_usd(stats.volume),
        format_usd(stats.buy_volume),
        format_usd(stats.sell_volume),
        stats.transactions,
        stats.buy_transactions,
        stats.sell_transactions,
        format_usd(stats.peak_price),
        format_usd_decimal(stats.peak_mcap),
        format_usd(stats.low_price),
        format_usd_decimal(stats.low_mcap),
        format_usd(report.peak_price_all),
        report.peak_price_time.format("%Y-%m-%d %H:%M"),
        format_usd_decimal(report.peak_mcap_all),
        format_usd(report.current_price),
        format_usd_decimal(report.current_mcap),
        liquidity,
    )
}

/// One plain user-facing line per failure kind; nothing internal leaks
/// across the request boundary.
fn user_message(err: &Error) -> String {
    match err {
        Error::PairNotFound(_) | Error::AmbiguousPair(_) => "Pair not found.".to_string(),
        Error::UpstreamUnavailable(_) | Error::EmptySeries(_) => {
            "Market data is unavailable right now, please try again later.".to_string()
        }
        Error::InsufficientHistory(_) => {
            "Not enough trading history to forecast this pair.".to_string()
        }
        _ => "Analysis failed, please try again later.".to_string(),
    }
}
