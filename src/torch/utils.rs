//! Torch utilities.
use tch::{Kind, TchError, Tensor};

/// Pad a tensor with zeros along the first dimension up to the given length.
///
/// # Args
/// * `tensor` - A tensor of shape `[L, *SHAPE]` with `L <= length`.
/// * `length` - Length of the first dimension of the result.
///
/// # Returns
/// A tensor of shape `[length, *SHAPE]` equal to `tensor` on `[0, L)` and to zero after.
pub fn f_pad_to_length(tensor: &Tensor, length: usize) -> Result<Tensor, TchError> {
    let mut shape = tensor.size();
    let current = match shape.first() {
        Some(&current) => current,
        None => {
            return Err(TchError::Shape(
                "cannot pad a 0-dimensional tensor".to_string(),
            ))
        }
    };
    let length = length as i64;
    if current > length {
        return Err(TchError::Shape(format!(
            "cannot pad a tensor of length {} to length {}",
            current, length
        )));
    }
    if current == length {
        return Ok(tensor.shallow_clone());
    }
    shape[0] = length - current;
    let padding = Tensor::f_zeros(&shape, (tensor.kind(), tensor.device()))?;
    Tensor::f_cat(&[tensor.shallow_clone(), padding], 0)
}

/// Pad tensors to a common length and stack them into a batch.
///
/// # Returns
/// A tensor of shape `[N, length, *SHAPE]`.
pub fn f_pad_and_stack<'a, I>(tensors: I, length: usize) -> Result<Tensor, TchError>
where
    I: IntoIterator<Item = &'a Tensor>,
{
    let padded = tensors
        .into_iter()
        .map(|t| f_pad_to_length(t, length))
        .collect::<Result<Vec<_>, _>>()?;
    Tensor::f_stack(&padded, 0)
}

/// The valid (unpadded) prefix of each row of a padded batch.
///
/// # Args
/// * `tensor` - A padded tensor of shape `[N, T, *SHAPE]`.
/// * `valids` - The valid length of each row. Must have `N` elements each at most `T`.
///
/// # Returns
/// `N` tensors, the `i`-th with shape `[valids[i], *SHAPE]`.
pub fn filter_valids(tensor: &Tensor, valids: &[i64]) -> Vec<Tensor> {
    valids
        .iter()
        .enumerate()
        .map(|(i, &valid)| tensor.get(i as i64).narrow(0, 0, valid))
        .collect()
}

/// Mean over the valid steps of a padded batch.
///
/// # Args
/// * `tensor` - A padded tensor of shape `[N, T]`.
/// * `valids` - The valid length of each row.
///
/// # Returns
/// A scalar tensor. Every valid step has equal weight regardless of the row it belongs to.
pub fn valid_mean(tensor: &Tensor, valids: &[i64]) -> Tensor {
    Tensor::cat(&filter_valids(tensor, valids), 0).mean(Kind::Float)
}
