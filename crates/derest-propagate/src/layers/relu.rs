use super::DerestLayer;
use derest_core::Result;
use derest_tensor::Interval;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReluLayer;

/// ReLU activation bounds.
///
/// Uses the realization's kernel when it has one and `(x + |x|) / 2`
/// otherwise.
pub fn a_relu<I: Interval>(input: &I) -> Result<I> {
    match input.op_relu() {
        Err(e) if e.is_not_supported() => Ok(input.add(&input.abs())?.scale(0.5)),
        other => other,
    }
}

impl DerestLayer for ReluLayer {
    fn activation<I: Interval>(&self, input: &I) -> Result<I> {
        a_relu(input)
    }

    fn derivative<I: Interval>(&self, output: &I, activation: &I) -> Result<I> {
        output.op_d_relu(activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use derest_tensor::{Bindings, BoundedTensor, SymbolicInterval};
    use ndarray::arr1;

    fn eval_lazy(x: &BoundedTensor) -> BoundedTensor {
        let sym = SymbolicInterval::input("x", x.shape());
        a_relu(&sym)
            .unwrap()
            .eval(&Bindings::new().bind("x", x.clone()))
            .unwrap()
    }

    #[test]
    fn test_fallback_exact_on_points() {
        let x = BoundedTensor::concrete(arr1(&[-2.0, 0.0, 1.5]).into_dyn());
        let eager = a_relu(&x).unwrap();
        assert_eq!(eager.lower, arr1(&[0.0, 0.0, 1.5]).into_dyn());
        assert_eq!(eval_lazy(&x), eager);
    }

    #[test]
    fn test_fallback_encloses_kernel() {
        let x = BoundedTensor::new(
            arr1(&[-2.0, -1.0, 1.0]).into_dyn(),
            arr1(&[-1.0, 1.0, 2.0]).into_dyn(),
        )
        .unwrap();
        let eager = a_relu(&x).unwrap();
        assert_eq!(eager.lower, arr1(&[0.0, 0.0, 1.0]).into_dyn());
        assert_eq!(eager.upper, arr1(&[0.0, 1.0, 2.0]).into_dyn());

        let lazy = eval_lazy(&x);
        for (outer, inner) in lazy.iter().zip(eager.iter()) {
            assert!(outer.lower <= inner.lower && inner.upper <= outer.upper);
        }
        // [-2, -1] + [1, 2] halves to [-0.5, 0.5].
        assert_eq!(lazy.get(&[0]), Some(derest_core::Bound::new(-0.5, 0.5)));
    }
}
