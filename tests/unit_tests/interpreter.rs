use glt_codegen::ast::{
    Argument, BinaryOp, CodeExpr, Dtype, FunctionDef, FunctionMetadata, GeneratedModule, Stmt, Variable,
};
use glt_codegen::backend::BackendConfig;
use glt_codegen::error::RuntimeError;
use glt_codegen::runtime::{ArrayData, CompiledModule, Interpreter, NdArray, Toolchain, Value};
use matrixcompare::assert_scalar_eq;
use num::complex::Complex64;
use std::rc::Rc;
use std::sync::Arc;

fn function(name: &str, arguments: Vec<Argument>, body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        arguments,
        body,
        imports: vec![],
        metadata: FunctionMetadata::default(),
    }
}

fn compile(functions: Vec<FunctionDef>) -> Arc<dyn CompiledModule> {
    let module = GeneratedModule {
        name: "test".to_string(),
        functions,
    };
    Interpreter
        .compile(&module, "", &BackendConfig::default())
        .unwrap()
}

/// `fill(out, value)` writes `value*i` into `out[i]`, `twice(out, value)` calls it twice.
fn fill_module() -> Arc<dyn CompiledModule> {
    let out = Variable::new("out", Dtype::Complex, 1);
    let value = Variable::scalar("value", Dtype::Complex);
    let indices = vec!["i".to_string()];
    let fill = function(
        "fill",
        vec![Argument::required(out.clone()), Argument::required(value.clone())],
        Stmt::loop_nest(
            &indices,
            &[CodeExpr::Len(Box::new(out.expr()))],
            vec![Stmt::aug_assign(out.at(&indices), value.expr() * CodeExpr::var("i"))],
        ),
    );
    let call = CodeExpr::Call("fill".to_string(), vec![out.expr(), value.expr()]);
    let twice = function(
        "twice",
        vec![Argument::required(out.clone()), Argument::required(value.clone())],
        vec![Stmt::Expr(call.clone()), Stmt::Expr(call), Stmt::Return(out.expr())],
    );
    compile(vec![fill, twice])
}

#[test]
fn routines_update_shared_buffers_in_place() {
    let module = fill_module();
    assert_eq!(module.routines(), vec!["fill", "twice"]);

    let out = Value::array(NdArray::zeros(&[3], Dtype::Complex).unwrap());
    let value = Value::Complex(Complex64::new(0.5, 1.0));
    let result = module.call("twice", vec![out.clone(), value]).unwrap();

    let expected = [0.0, 1.0, 2.0].map(|i| Complex64::new(i, 2.0 * i));
    assert_eq!(out.as_array().unwrap().borrow().to_complex_vec(), expected.to_vec());
    assert!(Rc::ptr_eq(result.as_array().unwrap(), out.as_array().unwrap()));
}

#[test]
fn compile_rejects_calls_to_undefined_routines() {
    let call = Stmt::Expr(CodeExpr::Call("missing".to_string(), vec![]));
    let module = GeneratedModule {
        name: "test".to_string(),
        functions: vec![function("caller", vec![], vec![call])],
    };
    let err = Interpreter
        .compile(&module, "", &BackendConfig::default())
        .err()
        .expect("Compilation must fail");
    assert!(err.to_string().contains("missing"));
}

#[test]
fn argument_count_is_checked() {
    let module = fill_module();
    let err = module.call("fill", vec![Value::None]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::WrongArgumentCount {
            routine: "fill".to_string(),
            expected: 2,
            found: 1
        }
    );
    assert_eq!(
        module.call("unknown", vec![]).unwrap_err(),
        RuntimeError::UnknownRoutine("unknown".to_string())
    );
}

#[test]
fn optional_arguments_default_to_none() {
    let out = Variable::new("out", Dtype::Real, 1);
    let body = vec![
        Stmt::IfNone {
            name: "out".to_string(),
            body: vec![Stmt::assign(
                out.expr(),
                CodeExpr::Zeros {
                    shape: vec![CodeExpr::Int(2)],
                    dtype: Dtype::Real,
                },
            )],
        },
        Stmt::assign(out.expr().full_slice(1), CodeExpr::real(1.5)),
        Stmt::Return(out.expr()),
    ];
    let module = compile(vec![function("allocate", vec![Argument::optional(out)], body)]);

    let fresh = module.call("allocate", vec![]).unwrap();
    assert_eq!(
        fresh.as_array().unwrap().borrow().data(),
        &ArrayData::Real(vec![1.5, 1.5])
    );

    let supplied = Value::array(NdArray::zeros(&[3], Dtype::Real).unwrap());
    module.call("allocate", vec![supplied.clone()]).unwrap();
    assert_eq!(
        supplied.as_array().unwrap().borrow().data(),
        &ArrayData::Real(vec![1.5, 1.5, 1.5])
    );
}

#[test]
fn arithmetic_follows_the_numeric_tower() {
    let x = Variable::scalar("x", Dtype::Real);
    let expr = CodeExpr::binary(
        BinaryOp::Sub,
        CodeExpr::Call("cos".to_string(), vec![x.expr()]),
        CodeExpr::binary(BinaryOp::Pow, x.expr(), CodeExpr::Int(-2)),
    );
    let module = compile(vec![function(
        "f",
        vec![Argument::required(x)],
        vec![Stmt::Return(expr)],
    )]);

    match module.call("f", vec![Value::Real(0.5)]).unwrap() {
        Value::Real(value) => assert_scalar_eq!(value, 0.5f64.cos() - 4.0, comp = abs, tol = 1e-14),
        other => panic!("Expected a real, got {:?}", other),
    }
    match module.call("f", vec![Value::Int(2)]).unwrap() {
        Value::Real(value) => assert_scalar_eq!(value, 2f64.cos() - 0.25, comp = abs, tol = 1e-14),
        other => panic!("Expected a real, got {:?}", other),
    }
    match module.call("f", vec![Value::Complex(Complex64::new(0.0, 1.0))]).unwrap() {
        Value::Complex(value) => {
            // cos(i) - i^-2 = cosh(1) + 1
            assert_scalar_eq!(value.re, 1f64.cosh() + 1.0, comp = abs, tol = 1e-14);
            assert_scalar_eq!(value.im, 0.0, comp = abs, tol = 1e-14);
        }
        other => panic!("Expected a complex, got {:?}", other),
    }
}

#[test]
fn complex_values_do_not_fit_real_arrays() {
    let out = Variable::new("out", Dtype::Real, 1);
    let body = vec![
        Stmt::assign(CodeExpr::var("i"), CodeExpr::Int(0)),
        Stmt::assign(out.at(&["i".to_string()]), CodeExpr::ImaginaryUnit),
    ];
    let module = compile(vec![function("store", vec![Argument::required(out)], body)]);

    let buffer = Value::array(NdArray::zeros(&[1], Dtype::Real).unwrap());
    let err = module.call("store", vec![buffer]).unwrap_err();
    assert!(matches!(err, RuntimeError::TypeMismatch { .. }));

    let small = Value::array(NdArray::zeros(&[0], Dtype::Complex).unwrap());
    let err = module.call("store", vec![small]).unwrap_err();
    assert_eq!(
        err,
        RuntimeError::IndexOutOfBounds {
            index: vec![0],
            shape: vec![0]
        }
    );
}
