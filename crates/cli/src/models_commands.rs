use {anyhow::Result, sapfire_config::SapfireConfig, sapfire_providers::GeminiProvider};

pub async fn list(config: &SapfireConfig) -> Result<()> {
    let gemini = &config.providers.gemini;
    let provider = GeminiProvider::from_config(gemini)?;
    let models = provider.list_available_models().await?;
    if models.is_empty() {
        println!("No models available.");
        return Ok(());
    }
    for model in &models {
        let id = model.model_id();
        let marker = if id == gemini.text_model {
            " [text]"
        } else if id == gemini.image_model {
            " [image]"
        } else {
            ""
        };
        println!("  {id}{marker}  {}", model.display_name);
    }
    Ok(())
}
