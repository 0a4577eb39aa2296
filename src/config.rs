//! Configuration management for Forge.
//!
//! Loads configuration from environment variables with support for:
//! - Multiple embedding providers with fallback priority
//! - An OpenAI-compatible chat model endpoint
//! - Retrieval, tool loop and chat memory tuning
//!
//! Services take the section structs directly, so tests build them with
//! `Default` and never touch the process environment.

use std::env;
use std::sync::OnceLock;

use forge_embeddings::{default_dimension, EmbeddingConfig, EmbeddingProviderConfig};

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration
pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Initialize configuration (call once at startup)
pub fn init() -> &'static Config {
    config()
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub generation: GenerationConfig,
    pub chat_memory: ChatMemoryConfig,
    pub storage: StorageConfig,
    pub tools: ToolsConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8123,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// When false the in-process vector store is used instead
    pub enabled: bool,
    pub url: String,
    pub collection_prefix: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:6334".to_string(),
            collection_prefix: "forge_".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            timeout_secs: 300,
            max_tokens: None,
            temperature: None,
        }
    }
}

/// Retrieval-augmentation settings.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub enabled: bool,
    pub top_k: usize,
    pub min_score: f32,
    /// Re-query for the single closest fragment when nothing clears `min_score`
    pub guarantee_top_one: bool,
    pub max_chunk_size: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: 5,
            min_score: 0.6,
            guarantee_top_one: true,
            max_chunk_size: 8000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Cumulative tool calls allowed in one turn
    pub max_tool_invocations: usize,
    /// Tools whose output is replaced by a short acknowledgement in the stream
    pub silent_tools: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tool_invocations: 20,
            silent_tools: DEFAULT_SILENT_TOOLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

const DEFAULT_SILENT_TOOLS: &[&str] = &["readFile", "readDir", "readDirectory"];

#[derive(Debug, Clone)]
pub struct ChatMemoryConfig {
    pub max_messages: usize,
}

impl Default for ChatMemoryConfig {
    fn default() -> Self {
        Self { max_messages: 20 }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory of generated projects (default: "./data/code_output")
    pub code_output_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            code_output_root: "./data/code_output".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolsConfig {
    pub pexels_api_key: Option<String>,
    /// Override for the Pexels search endpoint
    pub pexels_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub enabled: bool,
    pub npm_command: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            npm_command: "npm".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: env_or("PORT", "8123").parse().unwrap_or(8123),
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/forge.db"),
            },
            qdrant: QdrantConfig {
                enabled: env_flag("QDRANT_ENABLED", true),
                url: env_or("QDRANT_URL", "http://localhost:6334"),
                collection_prefix: env_or("QDRANT_COLLECTION_PREFIX", "forge_"),
            },
            embedding: Self::parse_embedding_config(),
            llm: LlmConfig {
                base_url: env_or("LLM_BASE_URL", "https://api.openai.com/v1"),
                model: env_or("LLM_MODEL", "gpt-4o-mini"),
                api_key: env::var("LLM_API_KEY")
                    .or_else(|_| env::var("OPENAI_API_KEY"))
                    .unwrap_or_default(),
                timeout_secs: env_or("LLM_TIMEOUT_SECS", "300").parse().unwrap_or(300),
                max_tokens: env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()),
                temperature: env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()),
            },
            rag: RagConfig {
                enabled: env_flag("RAG_ENABLED", true),
                top_k: env_or("RAG_TOP_K", "5").parse().unwrap_or(5),
                min_score: env_or("RAG_MIN_SCORE", "0.6").parse().unwrap_or(0.6),
                guarantee_top_one: env_flag("RAG_GUARANTEE_TOP_ONE", true),
                max_chunk_size: env_or("RAG_MAX_CHUNK_SIZE", "8000")
                    .parse()
                    .unwrap_or(8000),
            },
            generation: GenerationConfig {
                max_tool_invocations: env_or("MAX_TOOL_INVOCATIONS", "20")
                    .parse()
                    .unwrap_or(20),
                silent_tools: env::var("SILENT_TOOLS")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_else(|_| GenerationConfig::default().silent_tools),
            },
            chat_memory: ChatMemoryConfig {
                max_messages: env_or("CHAT_MEMORY_MAX_MESSAGES", "20")
                    .parse()
                    .unwrap_or(20),
            },
            storage: StorageConfig {
                code_output_root: env_or("CODE_OUTPUT_ROOT", "./data/code_output"),
            },
            tools: ToolsConfig {
                pexels_api_key: env::var("PEXELS_API_KEY").ok().filter(|k| !k.is_empty()),
                pexels_base_url: env::var("PEXELS_BASE_URL").ok(),
            },
            build: BuildConfig {
                enabled: env_flag("BUILD_ENABLED", true),
                npm_command: env_or("NPM_COMMAND", "npm"),
            },
        }
    }

    /// Parse embedding providers from environment.
    /// Supports Gemini, OpenAI-compatible and Ollama with fallback ordering.
    fn parse_embedding_config() -> EmbeddingConfig {
        let mut providers = Vec::new();

        // Gemini embeddings (priority 1)
        if let Ok(api_key) = env::var("GOOGLE_API_KEY") {
            let mut provider = EmbeddingProviderConfig::new("gemini", api_key, 1);
            provider.model = env_or("GEMINI_EMBEDDING_MODEL", &provider.model);
            providers.push(provider);
        }

        // OpenAI-compatible embeddings (priority 2)
        if let Ok(api_key) = env::var("OPENAI_API_KEY") {
            let mut provider = EmbeddingProviderConfig::new("openai", api_key, 2);
            provider.model = env_or("OPENAI_EMBEDDING_MODEL", &provider.model);
            provider.base_url = env_or("OPENAI_EMBEDDING_BASE_URL", &provider.base_url);
            providers.push(provider);
        }

        // Ollama embeddings - local, no authentication
        if let Ok(ollama_url) = env::var("OLLAMA_URL") {
            let priority = env_or("OLLAMA_PRIORITY", "1").parse().unwrap_or(1);
            let mut provider = EmbeddingProviderConfig::new("ollama", "", priority);
            provider.base_url = ollama_url;
            provider.model = env_or("OLLAMA_EMBEDDING_MODEL", &provider.model);
            providers.push(provider);
        }

        providers.sort_by_key(|p| p.priority);

        let default_dim = providers
            .first()
            .map(|p| default_dimension(&p.model))
            .unwrap_or(384);

        let dimension = env_or("EMBEDDING_DIMENSION", &default_dim.to_string())
            .parse()
            .unwrap_or(default_dim);

        EmbeddingConfig {
            providers,
            dimension,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
        .unwrap_or(default)
}
