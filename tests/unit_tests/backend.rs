use super::same_spaces;
use glt_codegen::ast::{Argument, Dtype, Import, Variable};
use glt_codegen::backend::{BackendConfig, BackendKind};
use glt_codegen::discrete::Discretization;
use glt_codegen::glt_splines::DiscreteDomain;
use glt_codegen::glt_symbolic::{BilinearForm, Expr, GltExpr};
use glt_codegen::kernel::KernelSettings;
use glt_codegen::printer::print_function;

fn arguments() -> Vec<Argument> {
    vec![
        Argument::required(Variable::new("arr_t1", Dtype::Real, 1)),
        Argument::required(Variable::scalar("p1", Dtype::Int)),
        Argument::required(Variable::new("symbol_11", Dtype::Complex, 2)),
    ]
}

#[test]
fn known_backends_by_name() {
    assert_eq!(BackendConfig::from_name("python").unwrap().kind, BackendKind::Interpreted);
    assert_eq!(BackendConfig::from_name("pyccel").unwrap().kind, BackendKind::StaticTyped);
    assert_eq!(BackendConfig::from_name("numba").unwrap().kind, BackendKind::Jit);
    assert_eq!(BackendConfig::from_name("pythran").unwrap().kind, BackendKind::Transpiled);
    assert!(BackendConfig::from_name("fortran").is_none());
    assert_eq!(BackendConfig::default(), BackendConfig::from_name("python").unwrap());
}

#[test]
fn backend_config_deserializes_with_default_folder() {
    let config: BackendConfig = serde_json::from_str(r#"{ "name": "numba", "kind": "jit" }"#).unwrap();
    assert_eq!(config, BackendConfig::new("numba", BackendKind::Jit));
    assert_eq!(config.folder, "__glt__");

    let config: BackendConfig =
        serde_json::from_str(r#"{ "name": "pyccel", "kind": "static_typed", "folder": "build" }"#).unwrap();
    assert_eq!(config.kind, BackendKind::StaticTyped);
    assert_eq!(config.folder, "build");
}

#[test]
fn kernel_settings_deserialize_with_defaults() {
    let settings: KernelSettings = serde_json::from_str(r#"{ "accumulate": true }"#).unwrap();
    assert!(settings.accumulate);
    assert_eq!(settings.backend, BackendConfig::default());

    let settings: KernelSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, KernelSettings::default());
}

#[test]
fn static_typed_metadata_annotates_every_argument() {
    let metadata = BackendKind::StaticTyped.metadata("kernel", &arguments());
    assert_eq!(metadata.header, None);
    assert_eq!(metadata.decorators.len(), 1);
    assert_eq!(metadata.decorators[0].name, "types");
    assert_eq!(
        metadata.decorators[0].arguments,
        vec!["'real[:]'", "'int'", "'complex[:,:]'"]
    );
    assert_eq!(
        BackendKind::StaticTyped.imports(),
        vec![Import::new("pyccel.decorators", "types")]
    );
}

#[test]
fn jit_and_transpiled_metadata() {
    let jit = BackendKind::Jit.metadata("kernel", &arguments());
    assert_eq!(jit.decorators[0].name, "jit");
    assert!(jit.decorators[0].arguments.is_empty());

    let transpiled = BackendKind::Transpiled.metadata("kernel", &arguments());
    assert!(transpiled.decorators.is_empty());
    assert_eq!(
        transpiled.header.as_deref(),
        Some("#pythran export kernel(float[:], int, complex[:,:])")
    );
    assert!(BackendKind::Transpiled.imports().is_empty());

    let interpreted = BackendKind::Interpreted.metadata("kernel", &arguments());
    assert!(interpreted.decorators.is_empty() && interpreted.header.is_none());
}

#[test]
fn backends_share_the_kernel_body() {
    let expr = GltExpr::new(BilinearForm::new(2).grad_dot_grad(Expr::one()));
    let domain = DiscreteDomain::unit(2);
    let build = |name: &str| {
        let settings = KernelSettings {
            accumulate: false,
            backend: BackendConfig::from_name(name).unwrap(),
        };
        Discretization::new()
            .with_settings(settings)
            .discretize(&expr, &domain, same_spaces(&[8, 8], &[2, 2]))
            .unwrap()
    };

    let python = build("python");
    let numba = build("numba");
    let pythran = build("pythran");
    assert_eq!(python.kernel().func().body, numba.kernel().func().body);
    assert_eq!(python.kernel().func().body, pythran.kernel().func().body);

    let numba_source = print_function(numba.kernel().func());
    assert!(numba_source.starts_with("@jit\ndef kernel_"));
    assert!(numba.source().contains("from numba import jit"));
    let pythran_source = print_function(pythran.kernel().func());
    assert!(pythran_source.starts_with("#pythran export kernel_"));
    assert!(pythran_source.contains("(float[:], float[:], float[:,:])"));
    assert!(print_function(python.kernel().func()).starts_with("def kernel_"));
}
