//! Command-line entry points besides `serve`
//!
//! Each takes its input and output streams so they can run against buffers.

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::batch::{self, BatchOutcome, BatchPipeline};
use crate::lookup::resolver::describe_error;
use crate::lookup::ParentResolver;

/// Full lookup for one name, printed as parent then description.
///
/// Returns an error when the lookup failed so the process exits non-zero.
pub async fn run_lookup<W: Write>(
    resolver: &ParentResolver,
    company_name: &str,
    out: &mut W,
) -> Result<()> {
    let company_name = company_name.trim();
    if company_name.is_empty() {
        anyhow::bail!("Please enter a company name");
    }

    let result = resolver.resolve_full(company_name).await;
    if let Some(error) = result.error {
        anyhow::bail!(error);
    }

    writeln!(
        out,
        "Parent company: {}",
        result.parent_company.unwrap_or_default()
    )?;
    writeln!(out)?;
    writeln!(out, "{}", result.description.unwrap_or_default())?;
    Ok(())
}

/// Interactive loop: read a name, print its parent, until `quit`, `exit` or EOF
pub async fn run_repl<R: BufRead, W: Write>(
    resolver: &ParentResolver,
    mut input: R,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "Parent Company Finder is running.")?;
    writeln!(out, "Enter a company name, or type 'quit' or 'exit' to stop.")?;

    let mut line = String::new();
    loop {
        write!(out, "\nEnter a company name: ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let company_name = line.trim();

        if company_name.eq_ignore_ascii_case("quit") || company_name.eq_ignore_ascii_case("exit")
        {
            break;
        }
        if company_name.is_empty() {
            continue;
        }

        let parent = match resolver.try_resolve_parent(company_name).await {
            Ok(parent) => parent,
            Err(e) => describe_error(&e),
        };
        writeln!(out, "The parent company of {} is: {}", company_name, parent)?;
    }

    writeln!(out, "Goodbye!")?;
    Ok(())
}

/// Batch a local spreadsheet.
///
/// Without `output`, the result lands in `default_dir` under the usual
/// `processed_` name.
pub async fn run_batch<W: Write>(
    pipeline: &BatchPipeline,
    input: &Path,
    output: Option<&Path>,
    default_dir: &Path,
    out: &mut W,
) -> Result<BatchOutcome> {
    let outcome = match output {
        Some(path) => {
            let source = input.to_path_buf();
            let parsed = tokio::task::spawn_blocking(move || batch::parse_sheet(&source))
                .await?
                .with_context(|| format!("Failed to read {}", input.display()))?;
            pipeline.process(parsed, path).await?
        }
        None => pipeline.run(input, default_dir).await?,
    };

    let summary = &outcome.summary;
    writeln!(out, "Wrote {}", outcome.file.path.display())?;
    writeln!(
        out,
        "{} rows: {} looked up, {} skipped, {} failed ({} ms)",
        summary.total_rows, summary.looked_up, summary.skipped, summary.failed, summary.elapsed_ms
    )?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RowFailurePolicy;
    use crate::lookup::test_support::ScriptedClient;
    use crate::lookup::{LookupError, UnavailableClient};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver() -> ParentResolver {
        ParentResolver::new(Arc::new(ScriptedClient::new(|prompt| {
            let reply = if prompt.contains("of YouTube?") {
                "Google"
            } else if prompt.contains("of Acme Corp?") {
                "ACME CORP"
            } else if prompt.starts_with("What is the parent company") {
                return Err(LookupError::Upstream("boom".to_string()));
            } else {
                "A short description."
            };
            Ok(reply.to_string())
        })))
    }

    #[tokio::test]
    async fn test_run_lookup_prints_parent_and_description() {
        let mut out = Vec::new();
        run_lookup(&resolver(), "  YouTube ", &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Parent company: Google\n\n"));
        assert!(text.contains("A short description."));
    }

    #[tokio::test]
    async fn test_run_lookup_reports_unavailable_client() {
        let resolver = ParentResolver::new(Arc::new(UnavailableClient));
        let mut out = Vec::new();

        let err = run_lookup(&resolver, "YouTube", &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("API client not initialized"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_run_lookup_rejects_blank_name() {
        let mut out = Vec::new();
        assert!(run_lookup(&resolver(), "   ", &mut out).await.is_err());
    }

    #[tokio::test]
    async fn test_repl_answers_until_quit() {
        let input = Cursor::new("YouTube\n\nAcme Corp\nBroken\nQUIT\nNever Asked\n");
        let mut out = Vec::new();

        run_repl(&resolver(), input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("The parent company of YouTube is: Google"));
        assert!(text.contains("The parent company of Acme Corp is: No parent company"));
        assert!(text.contains("The parent company of Broken is: An error occurred: boom"));
        assert!(!text.contains("Never Asked"));
        assert!(text.trim_end().ends_with("Goodbye!"));
    }

    #[tokio::test]
    async fn test_repl_stops_at_eof() {
        let mut out = Vec::new();
        run_repl(&resolver(), Cursor::new("YouTube"), &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("The parent company of YouTube is: Google"));
        assert!(text.trim_end().ends_with("Goodbye!"));
    }

    #[tokio::test]
    async fn test_run_batch_honours_explicit_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("companies.csv");
        std::fs::write(&input, "Company\nYouTube\n").unwrap();
        let output = dir.path().join("nested").join("result.csv");

        let pipeline = BatchPipeline::new(resolver(), Duration::ZERO, RowFailurePolicy::Record);
        let mut out = Vec::new();
        let outcome = run_batch(
            &pipeline,
            &input,
            Some(output.as_path()),
            dir.path(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(outcome.file.path, output);
        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.starts_with("Company,Parent Company"));
        assert!(written.contains("YouTube,Google"));
        assert!(String::from_utf8(out).unwrap().contains("1 rows: 1 looked up"));
    }

    #[tokio::test]
    async fn test_run_batch_defaults_to_processed_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("brands.csv");
        std::fs::write(&input, "Company\nYouTube\n").unwrap();
        let outputs = dir.path().join("outputs");

        let pipeline = BatchPipeline::new(resolver(), Duration::ZERO, RowFailurePolicy::Record);
        let outcome = run_batch(&pipeline, &input, None, &outputs, &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(outcome.file.output_filename, "processed_brands.csv");
        assert!(outputs.join("processed_brands.csv").is_file());
    }
}
