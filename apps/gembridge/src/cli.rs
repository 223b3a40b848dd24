use clap::Parser;

use gembridge_core::upstream::DEFAULT_BASE_URL;

#[derive(Debug, Clone, Parser)]
#[command(name = "gembridge", version, about = "OpenAI chat-completions bridge for Gemini")]
pub struct Cli {
    #[arg(long, env = "GEMBRIDGE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "GEMBRIDGE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Gemini API root, without the version segment.
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,
}
