//! Scratch cleanup, debug preservation and concurrent compilations.

use anyhow::Result;
use serde_json::json;

use typst_prep::test_utils::{FakeCompiler, TestProject, init_test_logging};
use typst_prep::workspace::ScratchWorkspace;
use typst_prep::{Bindings, CompileOptions, TypstService};

use crate::common::{bindings, read_artifact, setup};

fn debug_service(project: &TestProject) -> Result<TypstService> {
    init_test_logging(None);
    project.install_compiler(&FakeCompiler::Echo)?;
    let mut config = project.config();
    config.debug = true;
    Ok(TypstService::new(config)?)
}

#[tokio::test]
async fn test_debug_mode_preserves_every_role() -> Result<()> {
    let project = TestProject::new()?;
    project.write("resources/typst/Styles.typ", "#let x = 1")?;
    let service = debug_service(&project)?;

    let bytes = service
        .compile_to_bytes("#import \"Styles.typ\" : *\n= Doc", &Bindings::new(), &CompileOptions::default())
        .await?;
    assert!(!bytes.is_empty());

    let preserved = project.debug_files()?;
    assert_eq!(preserved.len(), 3, "{preserved:?}");
    assert!(preserved.iter().any(|n| n.contains("_input_typst_") && n.ends_with(".typ")));
    assert!(preserved.iter().any(|n| n.contains("_dependency_imported_") && n.ends_with("_Styles.typ")));
    assert!(preserved.iter().any(|n| n.contains("_output_typst_") && n.ends_with(".pdf")));

    // Preserved or not, the scratch copies are gone
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_debug_mode_preserves_on_failure() -> Result<()> {
    let project = TestProject::new()?;
    project.install_compiler(&FakeCompiler::Fail {
        exit_code: 1,
        stderr: "error".to_string(),
    })?;
    let mut config = project.config();
    config.debug = true;
    let service = TypstService::new(config)?;

    let result = service.compile_to_file("= Doc", &Bindings::new(), &CompileOptions::default()).await;

    assert!(result.is_err());
    let preserved = project.debug_files()?;
    assert_eq!(preserved.len(), 1, "{preserved:?}");
    assert!(preserved[0].contains("_input_typst_"));
    Ok(())
}

#[tokio::test]
async fn test_without_debug_nothing_is_preserved() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;

    service.compile_to_bytes("= Doc", &Bindings::new(), &CompileOptions::default()).await?;

    assert!(!project.debug_dir().exists());
    Ok(())
}

#[tokio::test]
async fn test_finished_compilation_keeps_running_ones_dependencies() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::CheckImports {
        marker: "SLOW".to_string(),
        seconds: 1,
    })?;
    project.write("resources/typst/Shared.typ", "#let shared = 1")?;
    let options = CompileOptions::default();
    let none = Bindings::new();

    // The slow compiler is still running when the fast call cleans up
    let (slow, fast) = tokio::join!(
        service.compile_to_file("#import \"Shared.typ\" : *\n= SLOW", &none, &options),
        async {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            service.compile_to_file("#import \"Shared.typ\" : *\n= fast", &none, &options).await
        },
    );
    let (slow, fast) = (slow?, fast?);

    assert_ne!(slow, fast);
    let slow_artifact = read_artifact(&slow)?;
    assert!(slow_artifact.contains("= SLOW"), "{slow_artifact}");
    assert!(slow_artifact.contains("_Shared.typ\n#let shared = 1"), "{slow_artifact}");
    assert!(read_artifact(&fast)?.contains("= fast"));
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_concurrent_compilations_with_different_bindings() -> Result<()> {
    let (project, service) = setup(&FakeCompiler::Echo)?;
    project.write("resources/typst/Title.tera.typ", "#let title = [{{ name }}]")?;
    let source = "#import \"Title.tera.typ\" : title\n= {{ name }}";

    let first = bindings(json!({"name": "first"}));
    let second = bindings(json!({"name": "second"}));
    let options = CompileOptions::default();
    let (a, b) = tokio::join!(
        service.compile_to_file(source, &first, &options),
        service.compile_to_file(source, &second, &options),
    );
    let (a, b) = (a?, b?);

    // Same scratch name, private copies: each artifact sees its own rendering
    let a = read_artifact(&a)?;
    let b = read_artifact(&b)?;
    assert!(a.contains("= first") && a.contains("#let title = [first]"), "{a}");
    assert!(b.contains("= second") && b.contains("#let title = [second]"), "{b}");
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_purge_removes_stale_scratch_entries() -> Result<()> {
    let project = TestProject::new()?;
    project.write("storage/typst/typst_crashed/typst_crashed.typ", "= Stale")?;
    project.write("storage/typst/typst_crashed/imported_0011_Stale.typ", "#let stale = 1")?;
    project.write("storage/typst/imported_2233_Other.typ", "#let other = 1")?;
    let artifact = project.write("storage/typst/typst_done.pdf", "%PDF")?;
    let workspace = ScratchWorkspace::open(&project.scratch_dir(), None)?;

    assert_eq!(workspace.purge_stale(), 2);

    assert!(artifact.is_file());
    assert!(project.scratch_files()?.is_empty());
    Ok(())
}
