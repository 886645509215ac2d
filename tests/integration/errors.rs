//! Compiler failures and how they surface.

use anyhow::Result;
use serde_json::json;

use typst_prep::test_utils::{FakeCompiler, TestProject, init_test_logging};
use typst_prep::{Bindings, CompileOptions, TypstError, TypstService};

use crate::common::{bindings, setup};

#[tokio::test]
async fn test_compilation_error_carries_stderr_verbatim() -> Result<()> {
    let stderr = "error: unknown variable: titel\n  ┌─ typst_x.typ:2:3\n  │\n2 │ = #titel\n";
    let (project, service) = setup(&FakeCompiler::Fail {
        exit_code: 1,
        stderr: stderr.to_string(),
    })?;
    project.write("resources/typst/Styles.typ", "#let x = 1")?;

    let err = service
        .compile_to_file("#import \"Styles.typ\" : *\n= #titel", &Bindings::new(), &CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TypstError::CompilationError {
            exit_code: Some(1),
            stderr: stderr.to_string(),
        }
    );
    // Scratch files are removed on the failure path too
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_exit_code_is_preserved() -> Result<()> {
    let (_project, service) = setup(&FakeCompiler::Fail {
        exit_code: 3,
        stderr: "fatal".to_string(),
    })?;

    let err = service
        .compile_to_bytes("= Doc", &Bindings::new(), &CompileOptions::default())
        .await
        .unwrap_err();

    match err {
        TypstError::CompilationError {
            exit_code,
            stderr,
        } => {
            assert_eq!(exit_code, Some(3));
            assert_eq!(stderr, "fatal\n");
        }
        other => panic!("expected CompilationError, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_timeout_kills_compiler_and_cleans_up() -> Result<()> {
    init_test_logging(None);
    let project = TestProject::new()?;
    project.install_compiler(&FakeCompiler::Hang {
        seconds: 30,
    })?;
    let mut config = project.config();
    config.timeout = 1;
    let service = TypstService::new(config)?;

    let started = std::time::Instant::now();
    let err = service
        .compile_to_file("= Slow {{ n }}", &bindings(json!({"n": 1})), &CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TypstError::Timeout {
            seconds: 1
        }
    );
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_compiler_binary() -> Result<()> {
    init_test_logging(None);
    let project = TestProject::new()?;
    let mut config = project.config();
    config.bin_path = "typst-prep-definitely-missing-binary".to_string();
    let service = TypstService::new(config)?;

    let err = service
        .compile_to_file("= Doc", &Bindings::new(), &CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TypstError::CompilerNotFound {
            bin_path: "typst-prep-definitely-missing-binary".to_string()
        }
    );
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_output_is_output_read_error() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::NoOutput)?;

    let err = service
        .compile_to_bytes("= Doc", &Bindings::new(), &CompileOptions::default())
        .await
        .unwrap_err();

    match err {
        TypstError::OutputReadError {
            path,
            ..
        } => assert_eq!(path.parent(), Some(project.scratch_dir().as_path())),
        other => panic!("expected OutputReadError, got {other:?}"),
    }
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_input_file() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    let missing = project.path().join("nope.typ");

    let err = service
        .compile_file_to_file(&missing, &Bindings::new(), None, &CompileOptions::default())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TypstError::InputNotFound {
            path: missing
        }
    );
    assert!(project.last_args().is_err(), "compiler must not run");
    Ok(())
}

#[tokio::test]
async fn test_render_error_names_entrypoint() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;

    let err = service
        .compile_to_file("{% if %}", &Bindings::new(), &CompileOptions::default())
        .await
        .unwrap_err();

    match err {
        TypstError::RenderError {
            template,
            ..
        } => assert_eq!(template, "entrypoint"),
        other => panic!("expected RenderError, got {other:?}"),
    }
    assert!(project.last_args().is_err());
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}
