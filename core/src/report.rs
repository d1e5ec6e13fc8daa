use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_REPORT_TEMPLATE: &str = r"# fMRI Autoencoder Notebook

<!-- SECTION:overview start -->
<!-- Summarize what this run probes: subject, ROI class, hemisphere. -->
<!-- SECTION:overview end -->

## Configuration

<!-- SECTION:configuration start -->
<!-- Populated automatically with the parameters of the latest run. -->
<!-- SECTION:configuration end -->

## Metrics

<!-- SECTION:metrics start -->
<!-- Populated automatically with training and evaluation summaries. -->
<!-- SECTION:metrics end -->

## Surface Maps

<!-- SECTION:surface-maps start -->
<!-- Fsaverage projections rendered from the raw responses. -->
<!-- SECTION:surface-maps end -->

> Sections between `<!-- SECTION:name start/end -->` markers are rewritten on
> every run; prose outside them is preserved.
";

/// One named, marker-delimited region of the report.
#[derive(Clone, Debug)]
pub struct ReportSection {
    id: String,
    content: String,
}

impl ReportSection {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }

    fn start_marker(&self) -> String {
        format!("<!-- SECTION:{} start -->", self.id)
    }

    fn end_marker(&self) -> String {
        format!("<!-- SECTION:{} end -->", self.id)
    }
}

/// Write the template if no report exists yet; an existing report is left
/// untouched so hand-written prose survives reruns.
pub fn ensure_report_file(path: &Path, template: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    if !path.exists() {
        fs::write(path, template)
            .with_context(|| format!("failed to write report template to {}", path.display()))?;
    }

    Ok(())
}

/// Replace the marked regions in the report with fresh content.
pub fn update_sections(path: &Path, sections: &[ReportSection]) -> Result<()> {
    let mut content = fs::read_to_string(path)
        .with_context(|| format!("failed to read report at {}", path.display()))?;

    for section in sections {
        content = replace_section(&content, section)?;
    }

    fs::write(path, content)
        .with_context(|| format!("failed to write updated report to {}", path.display()))?;
    Ok(())
}

fn replace_section(content: &str, section: &ReportSection) -> Result<String> {
    let start_marker = section.start_marker();
    let end_marker = section.end_marker();

    let start = content
        .find(&start_marker)
        .ok_or_else(|| anyhow!("missing start marker: {}", start_marker))?;
    let body_start = start + start_marker.len();
    let body_len = content[body_start..]
        .find(&end_marker)
        .ok_or_else(|| anyhow!("missing end marker: {}", end_marker))?;

    let trimmed = section.content.trim_matches('\n');
    let body = if trimmed.is_empty() {
        "\n".to_string()
    } else {
        format!("\n{trimmed}\n")
    };

    Ok(format!(
        "{}{}{}{}",
        &content[..start],
        start_marker,
        body,
        &content[body_start + body_len..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_only_the_named_section() {
        let report = "intro\n<!-- SECTION:metrics start -->\nold\n<!-- SECTION:metrics end -->\noutro";
        let updated =
            replace_section(report, &ReportSection::new("metrics", "loss 0.5")).unwrap();
        assert!(updated.contains("loss 0.5"));
        assert!(!updated.contains("old"));
        assert!(updated.starts_with("intro"));
        assert!(updated.ends_with("outro"));
    }

    #[test]
    fn missing_marker_is_an_error() {
        let err = replace_section("no markers here", &ReportSection::new("metrics", "x"))
            .unwrap_err();
        assert!(err.to_string().contains("missing start marker"));
    }

    #[test]
    fn template_sections_are_all_updatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        ensure_report_file(&path, DEFAULT_REPORT_TEMPLATE).unwrap();

        update_sections(
            &path,
            &[
                ReportSection::new("overview", "subject 3, floc-bodies, all"),
                ReportSection::new("configuration", "- Batch size: 30"),
                ReportSection::new("metrics", "- Final loss: 0.1"),
                ReportSection::new("surface-maps", "(none)"),
            ],
        )
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("subject 3, floc-bodies, all"));
        assert!(content.contains("- Final loss: 0.1"));
    }

    #[test]
    fn repeated_updates_are_idempotent_in_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        ensure_report_file(&path, DEFAULT_REPORT_TEMPLATE).unwrap();

        for _ in 0..3 {
            update_sections(&path, &[ReportSection::new("metrics", "- run")]).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("- run").count(), 1);
    }
}
