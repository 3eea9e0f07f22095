#[cfg(test)]
mod tests {
    use crate::config::{Config, LLMConfig, LLMProvider, OutputFormat, ResearchConfig, slugify};
    use crate::research::types::{FetchMode, SourceKind};
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.book_name.is_none());
        assert_eq!(config.corpus_path, PathBuf::from("./papers"));
        assert_eq!(config.output_path, PathBuf::from("./book_out"));
        assert_eq!(config.prompts_dir, PathBuf::from("./prompts"));
        assert_eq!(
            config.chapters,
            vec!["Chapter 1: Foundation", "Chapter 2: Logic"]
        );
        assert_eq!(config.output_format, OutputFormat::Pdf);
        assert!(config.export_script.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_research_config_default() {
        let config = ResearchConfig::default();

        assert!(config.search_query.is_none());
        assert_eq!(config.paper_limit, 5);
        assert_eq!(config.fetch_mode, FetchMode::Fulltext);
        assert_eq!(config.sources, vec![SourceKind::Arxiv]);
        assert!(!config.auto_confirm);
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();

        assert_eq!(config.provider, LLMProvider::Gemini);
        // api_key may be empty if env var is not set
        assert!(!config.model.is_empty());
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.token_budget, 5_000_000);
        assert!(!config.mock);
        assert!(!config.strict_mode);
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!("openai".parse::<LLMProvider>().unwrap(), LLMProvider::OpenAI);
        assert_eq!("Gemini".parse::<LLMProvider>().unwrap(), LLMProvider::Gemini);
        assert_eq!("ollama".parse::<LLMProvider>().unwrap(), LLMProvider::Ollama);
        assert!("invalid".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_output_format_round_names() {
        for format in [
            OutputFormat::Pdf,
            OutputFormat::Html,
            OutputFormat::Epub,
            OutputFormat::Docx,
            OutputFormat::Latex,
            OutputFormat::Json,
            OutputFormat::Markdown,
        ] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!(OutputFormat::Latex.extension(), "tex");
        assert!("pptx".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_get_book_name_with_configured_name() {
        let config = Config {
            book_name: Some("The Physics of Agentic AI".to_string()),
            keywords: Some("ignored".to_string()),
            ..Default::default()
        };

        assert_eq!(config.get_book_name(), "The Physics of Agentic AI");
        assert_eq!(config.book_slug(), "the_physics_of_agentic_ai");
    }

    #[test]
    fn test_get_book_name_falls_back_to_keywords_then_goal() {
        let mut config = Config {
            book_name: Some("   ".to_string()),
            keywords: Some("agentic systems".to_string()),
            goal: Some("survey planning".to_string()),
            ..Default::default()
        };
        assert_eq!(config.get_book_name(), "Agentic Systems");

        config.keywords = None;
        assert_eq!(config.get_book_name(), "Survey Planning");

        config.goal = None;
        assert_eq!(config.get_book_name(), "Untitled Manuscript");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Chapter 1: Foundation"), "chapter_1_foundation");
        assert_eq!(slugify("  --  "), "manuscript");
    }

    #[test]
    fn test_template_vars() {
        let mut config = Config::default();
        config.research.search_query = Some("agentic ai".to_string());
        config.llm.model = "gemini-test".to_string();

        let vars = config.template_vars();
        assert_eq!(vars["SEARCH_QUERY"], "agentic ai");
        assert_eq!(vars["MODEL_NAME"], "gemini-test");
        assert_eq!(vars["PAPER_LIMIT"], "5");
        assert_eq!(vars["OUTPUT_FORMAT"], "pdf");
        assert_eq!(vars["BOOK_NAME"], "Untitled Manuscript");
    }

    #[test]
    fn test_from_file_partial_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("factory.toml");
        std::fs::write(
            &path,
            r#"
book_name = "Agents"
chapters = ["One", "Two", "Three"]
output_format = "epub"

[research]
search_query = "tool use"
after = "2023-01-01"
sources = ["arxiv", "openalex"]
fetch_mode = "abstract"

[llm]
mock = true
token_budget = 1000
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.book_name.as_deref(), Some("Agents"));
        assert_eq!(config.chapters.len(), 3);
        assert_eq!(config.output_format, OutputFormat::Epub);
        assert_eq!(config.research.search_query.as_deref(), Some("tool use"));
        assert_eq!(
            config.research.after,
            Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        );
        assert_eq!(
            config.research.sources,
            vec![SourceKind::Arxiv, SourceKind::OpenAlex]
        );
        assert_eq!(config.research.fetch_mode, FetchMode::Abstract);
        assert_eq!(config.research.paper_limit, 5);
        assert!(config.llm.mock);
        assert_eq!(config.llm.token_budget, 1000);
        assert_eq!(config.llm.retry_attempts, 3);
        assert_eq!(config.corpus_path, PathBuf::from("./papers"));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(Config::from_file(&PathBuf::from("/nonexistent/factory.toml")).is_err());
    }
}
