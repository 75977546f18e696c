//! Typed n-dimensional payload buffer.

use crate::util::{ElementType, Error, JnrrdElement, Result};

/// A decoded payload: native-endian bytes plus element type and per-axis
/// extents, row-major with the fastest-varying axis last.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    element: ElementType,
    sizes: Vec<usize>,
    data: Vec<u8>,
}

impl Array {
    /// Build an array from raw native-endian bytes.
    ///
    /// The byte length must equal the product of `sizes` times the element
    /// size.
    pub fn from_parts(element: ElementType, sizes: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let count = checked_count(&sizes)?;
        let expected = count
            .checked_mul(element.num_bytes())
            .ok_or_else(|| Error::field("sizes", "payload byte length overflows usize"))?;
        if data.len() != expected {
            return Err(Error::PayloadLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            element,
            sizes,
            data,
        })
    }

    /// Build an array from a typed element vector.
    pub fn from_vec<T: JnrrdElement>(sizes: Vec<usize>, values: Vec<T>) -> Result<Self> {
        let count = checked_count(&sizes)?;
        if values.len() != count {
            return Err(Error::PayloadLengthMismatch {
                expected: count * T::SIZE,
                actual: values.len() * T::SIZE,
            });
        }
        Ok(Self {
            element: T::ELEMENT_TYPE,
            sizes,
            data: bytemuck::cast_slice(&values).to_vec(),
        })
    }

    /// Element type of the buffer.
    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element
    }

    /// Per-axis extents.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of axes.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.sizes.len()
    }

    /// Total element count.
    pub fn element_count(&self) -> usize {
        self.sizes.iter().product()
    }

    /// Buffer length in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Raw native-endian bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the array, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Typed view over the buffer.
    ///
    /// Fails when `T` does not match the stored element type.
    pub fn as_slice<T: JnrrdElement>(&self) -> Result<&[T]> {
        if T::ELEMENT_TYPE != self.element {
            return Err(Error::UnsupportedType(format!(
                "requested {} view over {} data",
                T::ELEMENT_TYPE.name(),
                self.element.name()
            )));
        }
        bytemuck::try_cast_slice(&self.data)
            .map_err(|e| Error::other(format!("buffer cast failed: {e}")))
    }
}

fn checked_count(sizes: &[usize]) -> Result<usize> {
    sizes
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or_else(|| Error::field("sizes", "element count overflows usize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_and_typed_view() {
        let values: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let array = Array::from_vec(vec![2, 3], values.clone()).unwrap();
        assert_eq!(array.element_type(), ElementType::Float32);
        assert_eq!(array.element_count(), 6);
        assert_eq!(array.byte_len(), 24);
        assert_eq!(array.as_slice::<f32>().unwrap(), values.as_slice());
    }

    #[test]
    fn test_wrong_typed_view_rejected() {
        let array = Array::from_vec(vec![4], vec![0u16, 1, 2, 3]).unwrap();
        assert!(matches!(
            array.as_slice::<f32>().unwrap_err(),
            Error::UnsupportedType(_)
        ));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Array::from_vec(vec![2, 3], vec![1u8, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::PayloadLengthMismatch { .. }));

        let err = Array::from_parts(ElementType::Uint16, vec![3], vec![0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadLengthMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }
}
