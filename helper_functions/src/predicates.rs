use itertools::Itertools as _;
use types::phase0::{
    containers::Validator,
    primitives::{Epoch, ValidatorIndex},
};

#[must_use]
pub const fn is_active_validator(validator: &Validator, epoch: Epoch) -> bool {
    validator.activation_epoch <= epoch && epoch < validator.exit_epoch
}

#[must_use]
pub fn is_sorted_and_unique(indices: &[ValidatorIndex]) -> bool {
    indices.iter().tuple_windows().all(|(a, b)| a < b)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::phase0::consts::FAR_FUTURE_EPOCH;

    use super::*;

    #[test_case(0, FAR_FUTURE_EPOCH, 5 => true)]
    #[test_case(6, FAR_FUTURE_EPOCH, 5 => false)]
    #[test_case(0, 5, 5 => false; "exit epoch is exclusive")]
    #[test_case(5, 6, 5 => true; "activation epoch is inclusive")]
    fn activity_is_a_half_open_range(activation_epoch: Epoch, exit_epoch: Epoch, epoch: Epoch) -> bool {
        let validator = Validator {
            activation_epoch,
            exit_epoch,
            ..Validator::default()
        };

        is_active_validator(&validator, epoch)
    }

    #[test_case(&[] => true)]
    #[test_case(&[1, 2, 5] => true)]
    #[test_case(&[1, 1] => false)]
    #[test_case(&[2, 1] => false)]
    fn attesting_indices_must_be_strictly_increasing(indices: &[ValidatorIndex]) -> bool {
        is_sorted_and_unique(indices)
    }
}
