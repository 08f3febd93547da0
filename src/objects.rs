//! Spline objects as seen by generated routines.
use crate::runtime::{DomainObject, NdArray, Value};
use glt_splines::{CollocationBasisValues, FemField, SplineMapping, SplineSpace};
use std::sync::Arc;

fn int_tuple(values: impl IntoIterator<Item = usize>) -> Value {
    Value::Tuple(values.into_iter().map(|v| Value::Int(v as i64)).collect())
}

impl DomainObject for Arc<SplineSpace> {
    fn type_name(&self) -> &'static str {
        "SplineSpace"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "degree" => Some(int_tuple(self.degree())),
            "ncells" => Some(int_tuple(self.ncells())),
            "nbasis" => Some(int_tuple(self.nbasis())),
            _ => None,
        }
    }
}

impl DomainObject for FemField {
    fn type_name(&self) -> &'static str {
        "FemField"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "coeffs" => Some(Value::array(NdArray::from_real(&self.shape(), self.coeffs().to_vec()))),
            "space" => Some(Value::object(self.space().clone())),
            _ => None,
        }
    }
}

impl DomainObject for Arc<SplineMapping> {
    fn type_name(&self) -> &'static str {
        "SplineMapping"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "fields" => Some(Value::Tuple(
                self.components().iter().cloned().map(Value::object).collect(),
            )),
            "weights" => Some(self.weights().cloned().map_or(Value::None, Value::object)),
            "ldim" => Some(Value::Int(self.ldim() as i64)),
            _ => None,
        }
    }
}

impl DomainObject for CollocationBasisValues {
    fn type_name(&self) -> &'static str {
        "CollocationBasisValues"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "spans" => Some(Value::Tuple(
                (0..self.ldim())
                    .map(|k| {
                        let spans = self.spans(k);
                        let data = spans.iter().map(|&s| s as i64).collect();
                        Value::array(NdArray::from_int(&[spans.len()], data))
                    })
                    .collect(),
            )),
            "basis" => Some(Value::Tuple(
                (0..self.ldim())
                    .map(|k| Value::array(NdArray::from_real(&self.basis_shape(k), self.basis(k).to_vec())))
                    .collect(),
            )),
            "nderiv" => Some(Value::Int(self.nderiv() as i64)),
            _ => None,
        }
    }
}
