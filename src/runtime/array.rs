use crate::ast::Dtype;
use crate::error::RuntimeError;
use crate::runtime::Value;
use num::complex::Complex64;

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int(Vec<i64>),
    Real(Vec<f64>),
    Complex(Vec<Complex64>),
}

/// A dense array stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

fn type_mismatch(expected: &str, found: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name(),
    }
}

impl NdArray {
    pub fn zeros(shape: &[usize], dtype: Dtype) -> Result<Self, RuntimeError> {
        let n = shape.iter().product();
        let data = match dtype {
            Dtype::Int => ArrayData::Int(vec![0; n]),
            Dtype::Real => ArrayData::Real(vec![0.0; n]),
            Dtype::Complex => ArrayData::Complex(vec![Complex64::new(0.0, 0.0); n]),
            Dtype::Object => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "numeric dtype".to_string(),
                    found: "object".to_string(),
                })
            }
        };
        Ok(Self {
            shape: shape.to_vec(),
            data,
        })
    }

    /// # Panics
    ///
    /// Panics if the length of the data does not match the shape.
    pub fn from_data(shape: &[usize], data: ArrayData) -> Self {
        let len = match &data {
            ArrayData::Int(v) => v.len(),
            ArrayData::Real(v) => v.len(),
            ArrayData::Complex(v) => v.len(),
        };
        assert_eq!(len, shape.iter().product::<usize>(), "Data length must match the shape.");
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn from_real(shape: &[usize], data: Vec<f64>) -> Self {
        Self::from_data(shape, ArrayData::Real(data))
    }

    pub fn from_int(shape: &[usize], data: Vec<i64>) -> Self {
        Self::from_data(shape, ArrayData::Int(data))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> Dtype {
        match self.data {
            ArrayData::Int(_) => Dtype::Int,
            ArrayData::Real(_) => Dtype::Real,
            ArrayData::Complex(_) => Dtype::Complex,
        }
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    fn flat_index(&self, index: &[usize]) -> Result<usize, RuntimeError> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return Err(RuntimeError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape.clone(),
            });
        }
        Ok(index.iter().zip(&self.shape).fold(0, |flat, (i, n)| flat * n + i))
    }

    pub fn get(&self, index: &[usize]) -> Result<Value, RuntimeError> {
        let i = self.flat_index(index)?;
        Ok(match &self.data {
            ArrayData::Int(v) => Value::Int(v[i]),
            ArrayData::Real(v) => Value::Real(v[i]),
            ArrayData::Complex(v) => Value::Complex(v[i]),
        })
    }

    /// Stores a scalar, converting it to the element type where this loses nothing.
    pub fn set(&mut self, index: &[usize], value: &Value) -> Result<(), RuntimeError> {
        let i = self.flat_index(index)?;
        match &mut self.data {
            ArrayData::Int(v) => match value {
                Value::Int(x) => v[i] = *x,
                other => return Err(type_mismatch("int", other)),
            },
            ArrayData::Real(v) => match value {
                Value::Int(x) => v[i] = *x as f64,
                Value::Real(x) => v[i] = *x,
                other => return Err(type_mismatch("float", other)),
            },
            ArrayData::Complex(v) => {
                v[i] = value.as_complex().ok_or_else(|| type_mismatch("complex", value))?;
            }
        }
        Ok(())
    }

    /// Sets every entry to the given scalar.
    pub fn fill(&mut self, value: &Value) -> Result<(), RuntimeError> {
        match &mut self.data {
            ArrayData::Int(v) => match value {
                Value::Int(x) => v.iter_mut().for_each(|e| *e = *x),
                other => return Err(type_mismatch("int", other)),
            },
            ArrayData::Real(v) => match value {
                Value::Int(x) => v.iter_mut().for_each(|e| *e = *x as f64),
                Value::Real(x) => v.iter_mut().for_each(|e| *e = *x),
                other => return Err(type_mismatch("float", other)),
            },
            ArrayData::Complex(v) => {
                let x = value.as_complex().ok_or_else(|| type_mismatch("complex", value))?;
                v.iter_mut().for_each(|e| *e = x);
            }
        }
        Ok(())
    }

    /// All entries as complex numbers, in row-major order.
    pub fn to_complex_vec(&self) -> Vec<Complex64> {
        match &self.data {
            ArrayData::Int(v) => v.iter().map(|&x| Complex64::new(x as f64, 0.0)).collect(),
            ArrayData::Real(v) => v.iter().map(|&x| Complex64::new(x, 0.0)).collect(),
            ArrayData::Complex(v) => v.clone(),
        }
    }
}
