use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;

use textmatch_lib::models::{LexicalReport, PlagiarismVerdict};
use textmatch_lib::services::{ConfigStore, DetectionSession, HybridAnalyzer};

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn print_lexical(report: &LexicalReport) {
    match report {
        LexicalReport::Similar(docs) => {
            println!("Lexically similar documents: {}", docs.len());
            for doc in docs {
                println!("  {:<40} {:.4}", doc.filename, doc.similarity);
            }
        }
        LexicalReport::NoSimilarTexts => println!("{}", LexicalReport::NO_SIMILAR_MESSAGE),
    }
}

fn print_verdict(verdict: &PlagiarismVerdict) {
    if !verdict.plagiarized {
        println!("Verdict: no plagiarism detected");
        return;
    }
    println!("Verdict: plagiarized");
    match verdict.edit_type {
        Some(edit_type) => println!("Edit type: {}", edit_type),
        None => println!("Edit type: (none)"),
    }
    for doc in &verdict.documents {
        println!(
            "  {:<40} semantic={:.4} lexical={:.4} matches={} inversions={}",
            doc.filename, doc.semantic_similarity, doc.lexical_similarity, doc.match_count, doc.inversion_count
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!(
            "Usage:\n  detect_text (--text <text> | --file <path.txt>) [--config <dir>] [--corpus <dir>] [--model <path>] [--rules-only] [--lexical-only] [--out <json_path>]\n\nNotes:\n  - Config is read from <dir>/config.json (default: the user config directory).\n  - `--rules-only` skips the spaCy service and uses local rules.\n  - Set TEXTMATCH_DISABLE_FILE_LOG=1 to log to the console only."
        );
        return Ok(());
    }

    textmatch_lib::init_logging();

    let config_dir = parse_arg_value(&args, "--config")
        .map(PathBuf::from)
        .or_else(ConfigStore::default_config_dir);
    let mut config = match config_dir {
        Some(dir) => ConfigStore::new(dir).load()?,
        None => Default::default(),
    };
    if let Some(corpus) = parse_arg_value(&args, "--corpus") {
        config.corpus_dir = PathBuf::from(corpus);
    }
    if let Some(model) = parse_arg_value(&args, "--model") {
        config.model_path = PathBuf::from(model);
    }
    if has_flag(&args, "--rules-only") {
        config.analyzer.rules_only = true;
    }

    let text = match (parse_arg_value(&args, "--text"), parse_arg_value(&args, "--file")) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path).with_context(|| format!("read {} failed", path))?,
        (None, None) => bail!("either --text or --file is required"),
    };
    let out_path = parse_arg_value(&args, "--out");

    let analyzer = Arc::new(HybridAnalyzer::from_config(&config.analyzer)?);
    let session = DetectionSession::open(&config, analyzer).await?;

    println!("Corpus: {} ({} documents)", config.corpus_dir.display(), session.corpus().len());
    println!("Input: {} chars  {}", text.chars().count(), preview(&text, 80));
    println!();

    let json = if has_flag(&args, "--lexical-only") {
        let report = session.check_similarity(&text).await?;
        print_lexical(&report);
        serde_json::to_string_pretty(&report)?
    } else {
        let verdict = session.detect(&text).await?;
        print_lexical(&verdict.lexical);
        print_verdict(&verdict);
        serde_json::to_string_pretty(&verdict)?
    };

    if let Some(out) = out_path {
        std::fs::write(&out, json).with_context(|| format!("write {} failed", out))?;
        println!();
        println!("Wrote JSON: {}", out);
    }

    Ok(())
}
