use formtrans_schema::{FormRegistry, FormSchema};

use crate::commands::open_registry;
use crate::settings::Settings;
use crate::{print_json, FormsCommand, OutputFormat};

pub(crate) async fn cmd_forms(
    settings: &Settings,
    command: FormsCommand,
    output: OutputFormat,
) -> Result<(), String> {
    let registry = open_registry(settings);
    match command {
        FormsCommand::List => {
            let forms = registry.list().await.map_err(|e| e.to_string())?;
            match output {
                OutputFormat::Json => print_json(&forms),
                OutputFormat::Text => {
                    if forms.is_empty() {
                        println!("no forms registered");
                    }
                    for form in &forms {
                        let category = form
                            .category
                            .as_deref()
                            .map(|c| format!(" [{}]", c))
                            .unwrap_or_default();
                        println!(
                            "{}  {}{}  ({} fields)",
                            form.id, form.name, category, form.field_count
                        );
                    }
                    Ok(())
                }
            }
        }
        FormsCommand::Show { id } => {
            let form = registry.resolve(&id).await.map_err(|e| e.to_string())?;
            match output {
                OutputFormat::Json => print_json(&form),
                OutputFormat::Text => {
                    print!("{}", render_form(&form));
                    Ok(())
                }
            }
        }
    }
}

fn render_form(form: &FormSchema) -> String {
    let mut out = format!("{} ({})\n", form.display_name(), form.id());
    if let Some(description) = form.description() {
        out.push_str(&format!("{}\n", description));
    }
    for field in form.fields() {
        out.push_str(&format!("  {}: {}", field.name, field.field_type));
        if !field.values.is_empty() {
            out.push_str(&format!(" [{}]", field.values.join(" | ")));
        }
        if let Some(description) = &field.description {
            out.push_str(&format!(" - {}", description));
        }
        out.push('\n');
    }
    out
}
