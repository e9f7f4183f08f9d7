// tests/resolution.rs

//! End-to-end resolution tests: graph walk, diagnostics and suppression.

mod common;

use common::*;
use restore_core::source::{AssetGroup, DependencyGroup, InMemorySource, PackageSource};
use restore_core::{DiagnosticCode, Error, PlatformTarget, Severity};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn sources(source: InMemorySource) -> Vec<Arc<dyn PackageSource>> {
    vec![Arc::new(source)]
}

#[tokio::test]
async fn test_downgrade_cites_resolved_version_and_both_paths() {
    let app = requires(requires(project("app", &["net8.0"]), "z", "1.*"), "x", "1.0.0");
    let report = resolver(sources(downgrade_catalogue()))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    let result = report.project("app").unwrap();
    let graph = result.graph(&PlatformTarget::new("net8.0")).unwrap();
    assert_eq!(graph.version_of("z"), Some(&v("1.5.0")));
    assert_eq!(graph.version_of("x"), Some(&v("1.0.0")));

    assert_eq!(result.diagnostics.len(), 2);
    for record in &result.diagnostics {
        assert_eq!(record.code, DiagnosticCode::Downgrade);
        assert_eq!(record.level, Severity::Warning);
        assert_eq!(record.library_id.as_deref(), Some("z"));
        assert!(record.message.contains("from 2.0.0 to 1.5.0"));
        assert!(!record.message.contains("to 1.0.0"));
    }
    assert!(result.diagnostics[0].message.ends_with("app -> x 1.0.0 -> z (>= 2.0.0)"));
    assert!(result.diagnostics[1].message.ends_with("app -> z (>= 1.0.0)"));

    let lines = report.render_diagnostics();
    assert!(lines[0].starts_with("warning DOWNGRADE: Detected package downgrade: z"));
}

#[tokio::test]
async fn test_downgrade_escalated_fails_the_run() {
    let mut app = requires(requires(project("app", &["net8.0"]), "z", "1.*"), "x", "1.0.0");
    app.warning_properties.warnings_as_errors = vec!["DOWNGRADE".to_string()];

    let report = resolver(sources(downgrade_catalogue()))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.diagnostics.iter().all(|d| d.level == Severity::Error));
    // The graph is still published; only the verdict changes
    assert!(report.project("app").unwrap().graph(&PlatformTarget::new("net8.0")).is_some());
}

#[tokio::test]
async fn test_sibling_conflict_fails() {
    let app = references(references(project("app", &["net8.0"]), "a"), "b");
    let a = requires(project("a", &["net8.0"]), "z", "[1.0.0]");
    let b = requires(project("b", &["net8.0"]), "z", "[2.0.0]");
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new());

    let report = resolver(sources(catalogue))
        .resolve(&[app, a, b], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert!(report.project("a").unwrap().success);
    assert!(report.project("b").unwrap().success);

    let app = report.project("app").unwrap();
    assert!(!app.success);
    assert!(!app.diagnostics.is_empty());
    let record = &app.diagnostics[0];
    assert_eq!(record.code, DiagnosticCode::Conflict);
    assert_eq!(record.level, Severity::Error);
    assert!(record.message.starts_with(
        "Version conflict detected for z: a requires z (= 1.0.0), b requires z (= 2.0.0)."
    ));

    let graph = app.graph(&PlatformTarget::new("net8.0")).unwrap();
    assert!(graph.get("z").is_none());
}

#[tokio::test]
async fn test_cycle_is_an_error_even_with_no_warn() {
    let mut app = requires_no_warn(project("app", &["net8.0"]), "x", "1.0.0", &["CIRCULAR"]);
    app.warning_properties.no_warn = vec!["CIRCULAR".to_string()];
    let catalogue = InMemorySource::new("local")
        .with_package("x", v("1.0.0"), vec![dep("y", "1.0.0")])
        .with_package("y", v("1.0.0"), vec![dep("x", "1.0.0")]);

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.diagnostics.len(), 1);
    let record = &report.diagnostics[0];
    assert_eq!(record.code, DiagnosticCode::Circular);
    assert_eq!(record.level, Severity::Error);
    assert!(record.message.ends_with("app -> x 1.0.0 -> y 1.0.0 -> x (>= 1.0.0)"));
}

#[tokio::test]
async fn test_edge_suppression_only_covers_its_path() {
    // a -> b -[NoWarn DOWNGRADE]-> z >= 2.0.0, and a -> z >= 1.0.0 directly
    let a = requires(references(project("a", &["net8.0"]), "b"), "z", "1.0.0");
    let b = requires_no_warn(project("b", &["net8.0"]), "z", "2.0.0", &["DOWNGRADE"]);
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new());

    let report = resolver(sources(catalogue))
        .resolve(&[a, b], &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    let a = report.project("a").unwrap();
    assert_eq!(a.diagnostics.len(), 1);
    assert_eq!(a.diagnostics[0].code, DiagnosticCode::Downgrade);
    assert_eq!(a.diagnostics[0].level, Severity::Warning);
    assert!(a.diagnostics[0].message.ends_with("a -> z (>= 1.0.0)"));
}

#[tokio::test]
async fn test_intermediate_project_no_warn_covers_paths_through_it() {
    let a = requires(references(project("a", &["net8.0"]), "b"), "z", "1.0.0");
    let mut b = requires(project("b", &["net8.0"]), "z", "2.0.0");
    b.warning_properties.no_warn = vec!["DOWNGRADE".to_string()];
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new());

    let report = resolver(sources(catalogue))
        .resolve(&[a, b], &CancellationToken::new())
        .await
        .unwrap();

    let a = report.project("a").unwrap();
    assert_eq!(a.diagnostics.len(), 1);
    assert!(a.diagnostics[0].message.ends_with("a -> z (>= 1.0.0)"));
}

#[tokio::test]
async fn test_no_warn_wins_over_warnings_as_errors() {
    let mut app = requires(requires(project("app", &["net8.0"]), "z", "1.*"), "x", "1.0.0");
    app.warning_properties.no_warn = vec!["DOWNGRADE".to_string()];
    app.warning_properties.warnings_as_errors = vec!["DOWNGRADE".to_string()];

    let report = resolver(sources(downgrade_catalogue()))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    assert!(report.diagnostics.is_empty());
}

#[tokio::test]
async fn test_outside_constraint_warns_on_each_path() {
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new())
        .with_package("x", v("1.0.0"), vec![dep("z", "[1.0.0]")]);
    let app = requires(requires(project("app", &["net8.0"]), "z", "2.0.0"), "x", "1.0.0");

    let report = resolver(sources(catalogue.clone()))
        .resolve(std::slice::from_ref(&app), &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    let result = report.project("app").unwrap();
    let graph = result.graph(&PlatformTarget::new("net8.0")).unwrap();
    assert_eq!(graph.version_of("z"), Some(&v("2.0.0")));

    assert_eq!(result.diagnostics.len(), 2);
    for record in &result.diagnostics {
        assert_eq!(record.code, DiagnosticCode::OutsideConstraint);
        assert_eq!(record.level, Severity::Warning);
        assert_eq!(record.library_id.as_deref(), Some("z"));
    }
    let messages: Vec<&str> = result.diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert!(messages.iter().any(|m| m.ends_with("app -> x 1.0.0 -> z (= 1.0.0)")));
    assert!(messages.iter().any(|m| m.ends_with("app -> z (>= 2.0.0)")));

    let mut strict = app;
    strict.warning_properties.warnings_as_errors = vec!["OUTSIDE_CONSTRAINT".to_string()];
    let report = resolver(sources(catalogue))
        .resolve(&[strict], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.diagnostics.iter().all(|d| d.level == Severity::Error));
}

#[tokio::test]
async fn test_package_ids_ignore_casing() {
    // app -> Z [1.0.0], app -> x 1.0.0 -> z >= 2.0.0
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_package("z", v("2.0.0"), Vec::new())
        .with_package("x", v("1.0.0"), vec![dep("z", "2.0.0")]);
    let app = requires(requires(project("app", &["net8.0"]), "Z", "[1.0.0]"), "x", "1.0.0");

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    let result = report.project("app").unwrap();
    let graph = result.graph(&PlatformTarget::new("net8.0")).unwrap();
    assert_eq!(graph.len(), 2);
    assert!(graph.libraries.contains_key("Z"));
    assert_eq!(graph.version_of("Z"), Some(&v("1.0.0")));
    assert_eq!(graph.version_of("z"), Some(&v("1.0.0")));

    assert_eq!(result.diagnostics.len(), 2);
    for record in &result.diagnostics {
        assert_eq!(record.code, DiagnosticCode::Downgrade);
        assert_eq!(record.library_id.as_deref(), Some("Z"));
        assert!(record.message.contains("from 2.0.0 to 1.0.0"));
    }
}

#[tokio::test]
async fn test_missing_requested_version_resolves_next_one() {
    let app = requires(project("app", &["net8.0"]), "z", "1.0.0");
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.1.0"), Vec::new())
        .with_package("z", v("1.2.0"), Vec::new());

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(report.success);
    let result = report.project("app").unwrap();
    assert_eq!(
        result.graph(&PlatformTarget::new("net8.0")).unwrap().version_of("z"),
        Some(&v("1.1.0"))
    );
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::MissingRequestedVersion);
    assert_eq!(result.diagnostics[0].level, Severity::Warning);
    assert!(result.diagnostics[0].message.contains("z 1.0.0 was not found"));
}

#[tokio::test]
async fn test_package_not_found() {
    let app = requires(project("app", &["net8.0"]), "nope", "1.0.0");
    let report = resolver(sources(InMemorySource::new("local")))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].code, DiagnosticCode::PackageNotFound);
    assert!(report.diagnostics[0].message.ends_with("app -> nope (>= 1.0.0)"));
}

#[tokio::test]
async fn test_package_without_compatible_assets() {
    let app = requires(project("app", &["net8.0"]), "z", "1.0.0");
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_assets("z", v("1.0.0"), vec![AssetGroup::compile("net9.0")]);

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    let record = &report.diagnostics[0];
    assert_eq!(record.code, DiagnosticCode::FrameworkIncompatible);
    assert!(record.message.starts_with("Package z 1.0.0 is not compatible with net8.0."));
    assert!(record.message.contains("supports: net9.0"));
}

#[tokio::test]
async fn test_project_reference_framework_compatibility() {
    let app = references(project("app", &["net8.0"]), "lib");
    let lib = project("lib", &["net9.0"]);

    let report = resolver(sources(InMemorySource::new("local")))
        .resolve(&[app.clone(), lib], &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.success);
    let record = &report.project("app").unwrap().diagnostics[0];
    assert_eq!(record.code, DiagnosticCode::FrameworkIncompatible);
    assert!(record.message.starts_with("Project lib is not compatible with net8.0. Project lib supports: net9.0"));

    // A fallback makes the reference consumable
    let lib = project("lib", &["netstandard2.0"]);
    let report = resolver_with_fallbacks(
        sources(InMemorySource::new("local")),
        &[("net8.0", &["netstandard2.0"])],
    )
    .resolve(&[app, lib], &CancellationToken::new())
    .await
    .unwrap();
    assert!(report.success);
    let graph = report
        .project("app")
        .unwrap()
        .graph(&PlatformTarget::new("net8.0"))
        .unwrap();
    assert!(graph.get("lib").is_some());
}

#[tokio::test]
async fn test_runtime_incompatible() {
    let mut app = requires(project("app", &["net8.0"]), "z", "1.0.0");
    app.platforms = vec![PlatformTarget::new("net8.0").with_runtime("linux-x64")];
    let catalogue = InMemorySource::new("local")
        .with_package("z", v("1.0.0"), Vec::new())
        .with_assets(
            "z",
            v("1.0.0"),
            vec![
                AssetGroup::compile("net8.0"),
                AssetGroup::runtime("net8.0", Some("win-x64")),
            ],
        );

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    let record = &report.diagnostics[0];
    assert_eq!(record.code, DiagnosticCode::RuntimeIncompatible);
    assert_eq!(record.target_graphs, vec!["net8.0/linux-x64".to_string()]);
}

#[tokio::test]
async fn test_identical_diagnostics_merge_across_platforms() {
    let app = requires(
        requires(project("app", &["net8.0", "net6.0"]), "z", "1.*"),
        "x",
        "1.0.0",
    );
    let report = resolver(sources(downgrade_catalogue()))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    let result = report.project("app").unwrap();
    assert_eq!(result.graphs_by_platform.len(), 2);
    assert_eq!(result.diagnostics.len(), 2);
    assert_eq!(
        result.diagnostics[0].target_graphs,
        vec!["net6.0".to_string(), "net8.0".to_string()]
    );
}

#[tokio::test]
async fn test_framework_specific_references_and_dependency_groups() {
    let mut app = requires(project("app", &["net8.0", "net6.0"]), "x", "1.0.0");
    app.package_references.push(restore_core::PackageReference {
        id: "only6".to_string(),
        version: "1.0.0".to_string(),
        no_warn: Vec::new(),
        frameworks: Some(vec!["net6.0".to_string()]),
    });
    let catalogue = InMemorySource::new("local")
        .with_dependency_groups(
            "x",
            v("1.0.0"),
            vec![
                DependencyGroup {
                    framework: Some("net8.0".to_string()),
                    dependencies: vec![dep("y", "1.0.0")],
                },
                DependencyGroup {
                    framework: None,
                    dependencies: Vec::new(),
                },
            ],
        )
        .with_package("y", v("1.0.0"), Vec::new())
        .with_package("only6", v("1.0.0"), Vec::new());

    let report = resolver(sources(catalogue))
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.success);

    let result = report.project("app").unwrap();
    let net8 = result.graph(&PlatformTarget::new("net8.0")).unwrap();
    let net6 = result.graph(&PlatformTarget::new("net6.0")).unwrap();
    assert!(net8.get("y").is_some());
    assert!(net8.get("only6").is_none());
    assert!(net6.get("y").is_none());
    assert!(net6.get("only6").is_some());
}

#[tokio::test]
async fn test_resolution_is_deterministic() {
    let app = requires(
        requires(references(project("app", &["net8.0", "net6.0"]), "lib"), "z", "1.*"),
        "x",
        "1.0.0",
    );
    let lib = requires(project("lib", &["net8.0", "net6.0"]), "nope", "2.0.0");
    let models = [app, lib];
    let resolver = resolver(sources(downgrade_catalogue()));

    let first = resolver.resolve(&models, &CancellationToken::new()).await.unwrap();
    let second = resolver.resolve(&models, &CancellationToken::new()).await.unwrap();

    assert_eq!(first.projects, second.projects);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[tokio::test]
async fn test_unreachable_source_fails_without_publishing() {
    let flaky = Arc::new(FlakySource::new(downgrade_catalogue(), u32::MAX));
    let app = requires(project("app", &["net8.0", "net6.0"]), "z", "1.*");

    let report = resolver(vec![flaky.clone() as Arc<dyn PackageSource>])
        .resolve(&[app], &CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.success);
    let result = report.project("app").unwrap();
    assert!(result.graphs_by_platform.is_empty());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::SourceUnavailable);
    assert_eq!(result.diagnostics[0].level, Severity::Error);
    // Both platforms asked for z; the key was attempted three times in total
    assert_eq!(flaky.calls("list:z"), 3);
}

#[tokio::test]
async fn test_invalid_model_is_a_configuration_error() {
    let app = references(project("app", &["net8.0"]), "missing");
    let result = resolver(sources(InMemorySource::new("local")))
        .resolve(&[app], &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::ConfigurationError(_))));

    let app = requires(project("app", &["net8.0"]), "z", "[2.0.0, 1.0.0]");
    let result = resolver(sources(InMemorySource::new("local")))
        .resolve(&[app], &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::ConfigurationError(_))));
}

#[tokio::test]
async fn test_cancelled_run_publishes_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let app = requires(project("app", &["net8.0"]), "z", "1.*");
    let result = resolver(sources(downgrade_catalogue())).resolve(&[app], &cancel).await;
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
async fn test_cancellation_interrupts_slow_source() {
    let slow = SlowSource::new(downgrade_catalogue(), Duration::from_secs(30));
    let app = requires(project("app", &["net8.0"]), "z", "1.*");
    let resolver = resolver(vec![Arc::new(slow)]);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), resolver.resolve(&[app], &cancel))
        .await
        .expect("cancellation should stop the run promptly");
    assert!(matches!(result, Err(Error::Cancelled)));
}
