use std::io::Read;
use std::path::PathBuf;

use formtrans_engine::{
    HistoryWrite, LlmClient, ModelConfig, OfflineClient, Provider, Translation,
    TranslationEngine, TranslationRequest,
};

use crate::commands::{open_history, open_registry};
use crate::settings::Settings;
use crate::{print_json, OutputFormat};

pub(crate) struct TranslateArgs {
    pub from: String,
    pub to: String,
    pub text: Option<String>,
    pub file: Option<PathBuf>,
    pub request_id: Option<String>,
}

pub(crate) async fn cmd_translate(
    settings: &Settings,
    args: TranslateArgs,
    output: OutputFormat,
) -> Result<(), String> {
    let source_text = read_source_text(&args)?;
    let client = model_client(settings.model_config()?)?;
    let history = open_history(settings).await?;
    let engine = TranslationEngine::new(
        open_registry(settings),
        history,
        client,
        settings.engine_config(),
    );

    let mut request = TranslationRequest::new(args.from, args.to, source_text);
    request.request_id = args.request_id;

    // Ctrl-C cancels the translation; the attempt is still recorded.
    let cancel = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let translation = engine
        .translate_until(request, cancel)
        .await
        .map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&translation),
        OutputFormat::Text => {
            print!("{}", render_text(&translation));
            Ok(())
        }
    }
}

fn read_source_text(args: &TranslateArgs) -> Result<String, String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    match &args.file {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .map_err(|e| format!("could not read '{}': {}", path.display(), e)),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("could not read stdin: {}", e))?;
            Ok(text)
        }
    }
}

fn model_client(config: ModelConfig) -> Result<Box<dyn LlmClient>, String> {
    match config.provider {
        #[cfg(feature = "openai")]
        Provider::OpenAi => Ok(Box::new(formtrans_engine::OpenAiClient::new(config))),
        #[cfg(feature = "anthropic")]
        Provider::Anthropic => Ok(Box::new(formtrans_engine::AnthropicClient::new(config))),
        Provider::Offline => Ok(Box::new(OfflineClient::new())),
        #[allow(unreachable_patterns)]
        other => Err(format!(
            "provider {:?} is not available in this build (enable the matching cargo feature)",
            other
        )),
    }
}

fn render_text(translation: &Translation) -> String {
    let result = &translation.result;
    let width = result.fields.keys().map(|k| k.len()).max().unwrap_or(0);

    let mut out = format!(
        "{} ({})\n",
        result.target_form_id,
        result.status.as_str()
    );
    for (name, value) in &result.fields {
        let shown = if value.is_unknown() {
            "(unknown)".to_string()
        } else {
            value.to_string()
        };
        out.push_str(&format!("  {:width$}  {}\n", name, shown, width = width));
    }
    if !result.warnings.is_empty() {
        out.push_str("warnings:\n");
        for warning in &result.warnings {
            out.push_str(&format!("  {}: {}\n", warning.field, warning.message));
        }
    }
    match &translation.history {
        HistoryWrite::Recorded { record_id } => {
            out.push_str(&format!("history: {}\n", record_id));
        }
        HistoryWrite::Failed { reason } => {
            out.push_str(&format!("history: not recorded ({})\n", reason));
        }
    }
    out
}
