use anyhow::{anyhow, bail};
use ember_consensus::{
    constants::{
        EFFECTIVE_BALANCE_INCREMENT, FAR_FUTURE_EPOCH, HYSTERESIS_DOWNWARD_MULTIPLIER,
        HYSTERESIS_QUOTIENT, HYSTERESIS_UPWARD_MULTIPLIER, INACTIVITY_PENALTY_QUOTIENT_ALTAIR,
        INACTIVITY_PENALTY_QUOTIENT_BELLATRIX, MAX_EFFECTIVE_BALANCE,
        MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR, MIN_SLASHING_PENALTY_QUOTIENT_BELLATRIX,
        PROPORTIONAL_SLASHING_MULTIPLIER_ALTAIR, PROPORTIONAL_SLASHING_MULTIPLIER_BELLATRIX,
    },
    misc::compute_activation_exit_epoch,
    preset::Preset,
    view::BeaconStateView,
};
use ember_network_spec::{ForkName, NetworkSpec};

/// Increase the validator balance at index ``index`` by ``delta``.
pub fn increase_balance<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    index: u64,
    delta: u64,
) -> anyhow::Result<()> {
    let balance = state
        .balances_mut()
        .get_mut(index as usize)
        .ok_or_else(|| anyhow!("Failed to increase balance of validator {index}"))?;
    *balance += delta;
    Ok(())
}

/// Decrease the validator balance at index ``index`` by ``delta`` with underflow protection.
pub fn decrease_balance<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    index: u64,
    delta: u64,
) -> anyhow::Result<()> {
    let balance = state
        .balances_mut()
        .get_mut(index as usize)
        .ok_or_else(|| anyhow!("Failed to decrease balance of validator {index}"))?;
    *balance = balance.saturating_sub(delta);
    Ok(())
}

/// Initiate the exit of the validator with index ``index``.
pub fn initiate_validator_exit<P: Preset, S: BeaconStateView<P>>(
    state: &mut S,
    index: u64,
    spec: &NetworkSpec,
) -> anyhow::Result<()> {
    // Return if validator already initiated exit
    let Some(validator) = state.validators().get(index as usize) else {
        bail!("Validator {index} not found")
    };
    if validator.exit_epoch != FAR_FUTURE_EPOCH {
        return Ok(());
    }

    // Compute exit queue epoch
    let mut exit_queue_epoch = state
        .validators()
        .iter()
        .map(|validator| validator.exit_epoch)
        .filter(|&epoch| epoch != FAR_FUTURE_EPOCH)
        .fold(
            compute_activation_exit_epoch(state.get_current_epoch()),
            u64::max,
        );
    let exit_queue_churn = state
        .validators()
        .iter()
        .filter(|validator| validator.exit_epoch == exit_queue_epoch)
        .count() as u64;
    if exit_queue_churn >= state.get_validator_churn_limit(spec) {
        exit_queue_epoch += 1;
    }

    // Set validator exit epoch and withdrawable epoch
    let Some(validator) = state.validators_mut().get_mut(index as usize) else {
        bail!("Validator {index} not found")
    };
    validator.exit_epoch = exit_queue_epoch;
    validator.withdrawable_epoch = exit_queue_epoch
        .checked_add(spec.min_validator_withdrawability_delay)
        .ok_or_else(|| anyhow!("Withdrawable epoch overflows for validator {index}"))?;
    Ok(())
}

/// The effective balance a validator with ``balance`` ends up with, moving only once the
/// balance leaves the hysteresis band around ``effective_balance``.
pub fn compute_effective_balance(balance: u64, effective_balance: u64) -> u64 {
    let hysteresis_increment = EFFECTIVE_BALANCE_INCREMENT / HYSTERESIS_QUOTIENT;
    let downward_threshold = hysteresis_increment * HYSTERESIS_DOWNWARD_MULTIPLIER;
    let upward_threshold = hysteresis_increment * HYSTERESIS_UPWARD_MULTIPLIER;
    if balance + downward_threshold < effective_balance
        || effective_balance + upward_threshold < balance
    {
        (balance - balance % EFFECTIVE_BALANCE_INCREMENT).min(MAX_EFFECTIVE_BALANCE)
    } else {
        effective_balance
    }
}

pub fn min_slashing_penalty_quotient<P: Preset>(fork: ForkName) -> u64 {
    match fork {
        ForkName::Phase0 => P::MIN_SLASHING_PENALTY_QUOTIENT,
        ForkName::Altair => MIN_SLASHING_PENALTY_QUOTIENT_ALTAIR,
        ForkName::Bellatrix => MIN_SLASHING_PENALTY_QUOTIENT_BELLATRIX,
    }
}

pub fn proportional_slashing_multiplier<P: Preset>(fork: ForkName) -> u64 {
    match fork {
        ForkName::Phase0 => P::PROPORTIONAL_SLASHING_MULTIPLIER,
        ForkName::Altair => PROPORTIONAL_SLASHING_MULTIPLIER_ALTAIR,
        ForkName::Bellatrix => PROPORTIONAL_SLASHING_MULTIPLIER_BELLATRIX,
    }
}

pub fn inactivity_penalty_quotient<P: Preset>(fork: ForkName) -> u64 {
    match fork {
        ForkName::Phase0 => P::INACTIVITY_PENALTY_QUOTIENT,
        ForkName::Altair => INACTIVITY_PENALTY_QUOTIENT_ALTAIR,
        ForkName::Bellatrix => INACTIVITY_PENALTY_QUOTIENT_BELLATRIX,
    }
}
