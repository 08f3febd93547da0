//! Construction of the caller-facing interface of a GLT kernel.
use crate::ast::{Argument, CodeExpr, Dtype, FunctionDef, FunctionMetadata, Import, Stmt, Variable};
use crate::error::ContractViolation;
use crate::evaluation::{basis_name, coeff_name, degree_name, spans_name, WEIGHTS_LABEL};
use crate::kernel::{coordinate_name, grid_shape, length_prelude, ArgumentRole, CodegenUnit, GltKernel, KernelSettings};
use log::debug;
use std::sync::Arc;

/// Name of the test space argument of the interface.
pub const SPACE_ARGUMENT: &str = "W";
pub const BASIS_VALUES_ARGUMENT: &str = "basis_values";
pub const MAPPING_ARGUMENT: &str = "mapping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceRole {
    Coordinate,
    Space,
    BasisValues,
    Mapping,
    Constant,
    PhysicalCoordinate,
    Field,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceArgument {
    pub argument: Argument,
    pub role: InterfaceRole,
}

impl InterfaceArgument {
    pub fn name(&self) -> &str {
        &self.argument.variable.name
    }
}

/// Adapts domain objects to the flat arguments of a kernel, allocates missing output buffers
/// and calls the kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct GltInterface {
    kernel: Arc<GltKernel>,
    arguments: Vec<InterfaceArgument>,
    func: FunctionDef,
}

impl GltInterface {
    pub fn build(kernel: Arc<GltKernel>, settings: &KernelSettings) -> Self {
        let ldim = kernel.ldim();
        let arguments = Self::signature(&kernel);
        let body = Self::body(&kernel);
        let name = format!("interface_{}", kernel.tag());
        let imports = vec![Import::new("numpy", "zeros")];
        let func = FunctionDef {
            name,
            arguments: arguments.iter().map(|a| a.argument.clone()).collect(),
            body,
            imports,
            metadata: FunctionMetadata::default(),
        };
        debug!(
            "Built interface {} of {}-dimensional kernel {} for backend {}",
            func.name,
            ldim,
            kernel.name(),
            settings.backend.name
        );
        Self {
            kernel,
            arguments,
            func,
        }
    }

    /// Builds the interface of a unit, which must be a kernel.
    pub fn from_unit(unit: Arc<dyn CodegenUnit>, settings: &KernelSettings) -> Result<Self, ContractViolation> {
        let found = unit.kind().to_string();
        match unit.into_kernel() {
            Some(kernel) => Ok(Self::build(kernel, settings)),
            None => Err(ContractViolation::ExpectedKernel { found }),
        }
    }

    fn signature(kernel: &GltKernel) -> Vec<InterfaceArgument> {
        let ldim = kernel.ldim();
        let required = |variable, role| InterfaceArgument {
            argument: Argument::required(variable),
            role,
        };
        let mut arguments: Vec<InterfaceArgument> = (0..ldim)
            .map(|k| required(Variable::new(coordinate_name(k), Dtype::Real, 1), InterfaceRole::Coordinate))
            .collect();
        arguments.push(required(Variable::object(SPACE_ARGUMENT), InterfaceRole::Space));
        if kernel.is_dependent() {
            arguments.push(required(Variable::object(BASIS_VALUES_ARGUMENT), InterfaceRole::BasisValues));
        }
        if kernel.mapping().is_some() {
            arguments.push(required(Variable::object(MAPPING_ARGUMENT), InterfaceRole::Mapping));
        }
        arguments.extend(
            kernel
                .arguments_with_role(ArgumentRole::Constant)
                .map(|c| required(c.clone(), InterfaceRole::Constant)),
        );
        arguments.extend(
            kernel
                .arguments_with_role(ArgumentRole::PhysicalCoordinate)
                .map(|x| required(x.clone(), InterfaceRole::PhysicalCoordinate)),
        );
        arguments.extend(
            kernel
                .field_coefficients()
                .map(|(field, _)| required(Variable::object(field), InterfaceRole::Field)),
        );
        arguments.extend(kernel.outputs().into_iter().map(|output| InterfaceArgument {
            argument: Argument::optional(output.clone()),
            role: InterfaceRole::Output,
        }));
        arguments
    }

    fn body(kernel: &GltKernel) -> Vec<Stmt> {
        let ldim = kernel.ldim();
        let mut body = length_prelude(ldim);

        if kernel.is_dependent() {
            let space = CodeExpr::var(SPACE_ARGUMENT);
            let basis_values = CodeExpr::var(BASIS_VALUES_ARGUMENT);
            for k in 0..ldim {
                body.push(Stmt::assign(
                    CodeExpr::var(degree_name(k)),
                    space.clone().attribute("degree").item(k),
                ));
            }
            for k in 0..ldim {
                body.push(Stmt::assign(
                    CodeExpr::var(spans_name(k)),
                    basis_values.clone().attribute("spans").item(k),
                ));
            }
            for k in 0..ldim {
                body.push(Stmt::assign(
                    CodeExpr::var(basis_name(k)),
                    basis_values.clone().attribute("basis").item(k),
                ));
            }
        }

        let mapping = CodeExpr::var(MAPPING_ARGUMENT);
        for (c, coeffs) in kernel
            .arguments_with_role(ArgumentRole::MappingCoeffs)
            .enumerate()
        {
            let source = if coeffs.name == coeff_name(WEIGHTS_LABEL) {
                mapping.clone().attribute("weights").attribute("coeffs")
            } else {
                mapping.clone().attribute("fields").item(c).attribute("coeffs")
            };
            body.push(Stmt::assign(coeffs.expr(), source));
        }
        for (field, coeffs) in kernel.field_coefficients() {
            let field = CodeExpr::var(field);
            body.push(Stmt::assign(coeffs.expr(), field.attribute("coeffs")));
        }

        for output in kernel.outputs() {
            let zeros = CodeExpr::Zeros {
                shape: grid_shape(ldim),
                dtype: output.dtype,
            };
            body.push(Stmt::IfNone {
                name: output.name.clone(),
                body: vec![Stmt::assign(output.expr(), zeros)],
            });
        }

        let call_arguments = kernel.arguments().iter().map(|a| a.variable.expr()).collect();
        body.push(Stmt::Expr(CodeExpr::Call(kernel.name().to_string(), call_arguments)));

        let outputs: Vec<CodeExpr> = kernel.outputs().iter().map(|o| o.expr()).collect();
        body.push(Stmt::Return(if outputs.len() == 1 {
            outputs.into_iter().next().unwrap_or(CodeExpr::None)
        } else {
            CodeExpr::Tuple(outputs)
        }));
        body
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    pub fn kernel(&self) -> &Arc<GltKernel> {
        &self.kernel
    }

    pub fn arguments(&self) -> &[InterfaceArgument] {
        &self.arguments
    }

    pub fn arguments_with_role(&self, role: InterfaceRole) -> impl Iterator<Item = &InterfaceArgument> {
        self.arguments.iter().filter(move |a| a.role == role)
    }

    /// Names of the arguments that must be supplied by the caller: constants, physical
    /// coordinates and fields.
    pub fn in_arguments(&self) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|a| {
                matches!(
                    a.role,
                    InterfaceRole::Constant | InterfaceRole::PhysicalCoordinate | InterfaceRole::Field
                )
            })
            .map(|a| a.name().to_string())
            .collect()
    }

    /// Names of the output buffers, which may be supplied by the caller.
    pub fn inout_arguments(&self) -> Vec<String> {
        self.arguments_with_role(InterfaceRole::Output)
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn func(&self) -> &FunctionDef {
        &self.func
    }
}

impl CodegenUnit for GltInterface {
    fn name(&self) -> &str {
        &self.func.name
    }

    fn func(&self) -> &FunctionDef {
        &self.func
    }

    fn kind(&self) -> &'static str {
        "interface"
    }
}
