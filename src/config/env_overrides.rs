use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) =
            std::env::var("PARLEY_LLM_BASE_URL").or_else(|_| std::env::var("LLM_BASE_URL"))
            && !base_url.is_empty()
        {
            self.llm.base_url = base_url;
        }

        if let Ok(model) =
            std::env::var("PARLEY_LLM_MODEL").or_else(|_| std::env::var("LLM_MODEL_NAME"))
            && !model.is_empty()
        {
            self.llm.model = model;
        }

        if let Ok(key) =
            std::env::var("PARLEY_LLM_API_KEY").or_else(|_| std::env::var("LLM_API_KEY"))
            && !key.is_empty()
        {
            self.llm.api_key = Some(key);
        }

        if let Ok(temp_str) =
            std::env::var("PARLEY_LLM_TEMPERATURE").or_else(|_| std::env::var("LLM_TEMPERATURE"))
            && let Ok(temp) = temp_str.parse::<f64>()
            && (0.0..=2.0).contains(&temp)
        {
            self.llm.temperature = temp;
        }

        if let Ok(threshold_str) = std::env::var("NEW_MESSAGES_THRESHOLD_FOR_SUMMARY")
            && let Ok(threshold) = threshold_str.parse::<u32>()
            && threshold > 0
        {
            self.memory.summary_threshold = threshold;
        }

        if let Ok(keep_str) = std::env::var("MESSAGES_TO_KEEP_AFTER_SUMMARY")
            && let Ok(keep) = keep_str.parse::<usize>()
        {
            self.memory.messages_to_keep = keep;
        }

        if let Ok(path) = std::env::var("PARLEY_DATABASE_PATH")
            && !path.is_empty()
        {
            self.memory.database_path = path;
        }
    }
}
