use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_f64, parse_u16, parse_u64,
};
use super::types::{
    ConfigError, DatabaseSettings, InferenceSettings, RuntimeSettings, ScoringSettings, Settings,
    StorageSettings, TelemetrySettings, TranslateSettings, WorkerSettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment = parse_environment(
            env_optional("SCRIPTMARK_ENV").or_else(|| env_optional("ENVIRONMENT")),
        );
        let strict_config = env_optional("SCRIPTMARK_STRICT_CONFIG")
            .map(|value| parse_bool(&value))
            .unwrap_or(false)
            || environment.is_production();

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "scriptmark");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "scriptmark_db");
        let database_url = env_optional("DATABASE_URL");

        let inference_base_url = env_or_default("INFERENCE_BASE_URL", "");
        let inference_api_key = env_or_default("INFERENCE_API_KEY", "");
        let inference_timeout = parse_u64(
            "INFERENCE_REQUEST_TIMEOUT",
            env_or_default("INFERENCE_REQUEST_TIMEOUT", "120"),
        )?;
        let ocr_model_en = env_or_default("OCR_MODEL_EN", "trocr-base-handwritten");
        let ocr_model_hi = env_or_default("OCR_MODEL_HI", "trocr-base-handwritten-hi");
        let ocr_model_fallback = env_or_default("OCR_MODEL_FALLBACK", "tesseract-eng-hin");
        let layout_model = env_or_default("LAYOUT_MODEL", "yolov8n-layout");
        let embedding_model = env_or_default("EMBEDDING_MODEL", "all-MiniLM-L6-v2");

        let translate_base_url = env_or_default("TRANSLATE_BASE_URL", "");
        let translate_timeout = parse_u64(
            "TRANSLATE_REQUEST_TIMEOUT",
            env_or_default("TRANSLATE_REQUEST_TIMEOUT", "30"),
        )?;

        let keyword_weight = parse_f64("KW_WEIGHT", env_or_default("KW_WEIGHT", "0.5"))?;
        let semantic_weight = parse_f64("SEM_WEIGHT", env_or_default("SEM_WEIGHT", "0.5"))?;

        let storage_root = env_or_default("STORAGE_ROOT", "uploads");

        let concurrency =
            parse_u64("WORKER_CONCURRENCY", env_or_default("WORKER_CONCURRENCY", "3"))?;
        let poll_interval_seconds = parse_u64(
            "WORKER_POLL_INTERVAL_SECONDS",
            env_or_default("WORKER_POLL_INTERVAL_SECONDS", "2"),
        )?;
        let stale_after_minutes = parse_u64(
            "WORKER_STALE_AFTER_MINUTES",
            env_or_default("WORKER_STALE_AFTER_MINUTES", "15"),
        )?;
        let analytics_refresh_seconds = parse_u64(
            "ANALYTICS_REFRESH_SECONDS",
            env_or_default("ANALYTICS_REFRESH_SECONDS", "300"),
        )?;

        let log_level = env_or_default("SCRIPTMARK_LOG_LEVEL", "info");
        let json = env_optional("SCRIPTMARK_LOG_JSON").map(|v| parse_bool(&v)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|v| parse_bool(&v)).unwrap_or(false);
        let prometheus_port = parse_u16(
            "PROMETHEUS_PORT",
            env_or_default("PROMETHEUS_PORT", "9100"),
        )?;

        let settings = Self {
            runtime: RuntimeSettings { environment, strict_config },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            inference: InferenceSettings {
                base_url: inference_base_url,
                api_key: inference_api_key,
                request_timeout_seconds: inference_timeout,
                ocr_model_en,
                ocr_model_hi,
                ocr_model_fallback,
                layout_model,
                embedding_model,
            },
            translate: TranslateSettings {
                base_url: translate_base_url,
                request_timeout_seconds: translate_timeout,
            },
            scoring: ScoringSettings { keyword_weight, semantic_weight },
            storage: StorageSettings { root: storage_root },
            worker: WorkerSettings {
                concurrency,
                poll_interval_seconds,
                stale_after_minutes,
                analytics_refresh_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled, prometheus_port },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn inference(&self) -> &InferenceSettings {
        &self.inference
    }

    pub(crate) fn translate(&self) -> &TranslateSettings {
        &self.translate
    }

    pub(crate) fn scoring(&self) -> &ScoringSettings {
        &self.scoring
    }

    pub(crate) fn storage(&self) -> &StorageSettings {
        &self.storage
    }

    pub(crate) fn worker(&self) -> &WorkerSettings {
        &self.worker
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scoring.keyword_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "KW_WEIGHT",
                value: self.scoring.keyword_weight.to_string(),
            });
        }
        if self.scoring.semantic_weight < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "SEM_WEIGHT",
                value: self.scoring.semantic_weight.to_string(),
            });
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        if self.worker.poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WORKER_POLL_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.inference.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("INFERENCE_BASE_URL"));
        }
        if self.inference.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("INFERENCE_API_KEY"));
        }

        Ok(())
    }
}
