//! The three compile operations against the echo compiler.

use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use typst_prep::resolver::scratch_filename;
use typst_prep::test_utils::FakeCompiler;
use typst_prep::{Bindings, CompileOptions, TypstService};

use crate::common::{bindings, count_with_extension, read_artifact, setup};

#[tokio::test]
async fn test_compile_to_file_renders_and_rewrites_imports() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let styles = project.write("resources/typst/Styles.typ", "#let accent = blue")?;

    let output = service
        .compile_to_file(
            "#import \"Styles.typ\" : *\n= {{ title }}",
            &bindings(json!({"title": "Quarterly"})),
            &CompileOptions::default(),
        )
        .await?;

    assert_eq!(output.parent(), Some(project.scratch_dir().as_path()));
    assert_eq!(output.extension().and_then(|e| e.to_str()), Some("pdf"));

    let scratch_name = scratch_filename(&styles);
    let artifact = read_artifact(&output)?;
    assert!(artifact.starts_with(&format!("#import \"{scratch_name}\" : *\n= Quarterly")), "{artifact}");
    assert!(artifact.contains(&format!("=== {scratch_name}\n#let accent = blue")), "{artifact}");

    // Artifact stays, scratch inputs and dependencies are gone
    assert!(output.is_file());
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_compile_to_bytes_deletes_artifact() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;

    let bytes = service
        .compile_to_bytes("= Hello {{ name }}", &bindings(json!({"name": "Ada"})), &CompileOptions::default())
        .await?;

    assert_eq!(String::from_utf8(bytes)?, "= Hello Ada");
    assert_eq!(count_with_extension(&project.scratch_dir(), "pdf")?, 0);
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_argument_vector() -> Result<()> {
    let (project, _) = setup(&FakeCompiler::Echo)?;
    let mut config = project.config();
    config.font_paths = vec![PathBuf::from("/cfg/fonts")];
    let service = TypstService::new(config)?;

    let options = CompileOptions {
        font_paths: vec![PathBuf::from("/call/fonts")],
        ..CompileOptions::default()
    };
    let output = service.compile_to_file("= Doc", &Bindings::new(), &options).await?;

    let args = project.last_args()?;
    assert_eq!(args.len(), 9, "{args:?}");
    assert_eq!(args[0], "compile");

    let input = PathBuf::from(&args[1]);
    // Entrypoint sits in its own job directory inside the scratch directory
    let job_dir = input.parent().map(std::path::Path::to_path_buf).unwrap_or_default();
    assert_eq!(job_dir.parent(), Some(project.scratch_dir().as_path()));
    assert!(!job_dir.exists(), "job directory must be removed");
    let input_name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
    assert!(input_name.starts_with("typst_") && input_name.ends_with(".typ"), "{input_name}");

    assert_eq!(PathBuf::from(&args[2]), output);
    assert_eq!(
        &args[3..],
        [
            "--root".to_string(),
            project.path().display().to_string(),
            "--font-path".to_string(),
            "/cfg/fonts".to_string(),
            "--font-path".to_string(),
            "/call/fonts".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_root_override_and_format() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let options = CompileOptions {
        format: Some("png".to_string()),
        root: Some(PathBuf::from("/srv/other")),
        ..CompileOptions::default()
    };

    let output = service.compile_to_file("= Doc", &Bindings::new(), &options).await?;

    assert_eq!(output.extension().and_then(|e| e.to_str()), Some("png"));
    let args = project.last_args()?;
    assert_eq!(&args[3..5], ["--root".to_string(), "/srv/other".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_rejected_format_falls_back_to_configured() -> Result<()> {
    let (_project, service) = setup(&FakeCompiler::Echo)?;

    let output = service
        .compile_to_file("= Doc", &Bindings::new(), &CompileOptions::with_format("png; id"))
        .await?;

    assert_eq!(output.extension().and_then(|e| e.to_str()), Some("pdf"));
    Ok(())
}

#[tokio::test]
async fn test_compile_file_to_file_default_output() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let input = project.write("docs/report.typ", "#import \"parts/Intro.typ\" : intro\n= {{ title }}")?;
    let intro = project.write("docs/parts/Intro.typ", "#let intro = [Welcome]")?;

    let output = service
        .compile_file_to_file(&input, &bindings(json!({"title": "Report"})), None, &CompileOptions::default())
        .await?;

    assert_eq!(output, project.path().join("docs/report.pdf"));
    let artifact = read_artifact(&output)?;
    let scratch_name = scratch_filename(&intro);
    assert!(artifact.starts_with(&format!("#import \"{scratch_name}\" : intro\n= Report")), "{artifact}");
    assert!(artifact.contains("#let intro = [Welcome]"));

    // The input file itself is never modified
    assert_eq!(
        std::fs::read_to_string(&input)?,
        "#import \"parts/Intro.typ\" : intro\n= {{ title }}"
    );
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_compile_file_to_file_explicit_output() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let input = project.write("letter.typ", "Dear {{ name }}")?;
    let target = project.path().join("out/letter.pdf");
    std::fs::create_dir_all(project.path().join("out"))?;

    let output = service
        .compile_file_to_file(&input, &bindings(json!({"name": "Grace"})), Some(&target), &CompileOptions::default())
        .await?;

    assert_eq!(output, target);
    assert_eq!(read_artifact(&output)?, "Dear Grace");
    Ok(())
}

#[tokio::test]
async fn test_compile_file_to_file_same_extension_output() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let input = project.write("page.typ", "= Page")?;

    let output = service
        .compile_file_to_file(&input, &Bindings::new(), None, &CompileOptions::with_format("typ"))
        .await?;

    assert_eq!(output, project.path().join("page.out.typ"));
    assert_eq!(read_artifact(&input)?, "= Page");
    Ok(())
}
