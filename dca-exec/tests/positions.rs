//! Position lifecycle through the vault: escrow, re-spreading, exits.
//!
//! Run with: `cargo test -p dca-exec --test positions`

mod common;

use chrono::Duration;

use common::*;
use dca_domain::{Address, Cadence, Event};
use dca_engine::{CreatePosition, EngineError, ModifyPosition, TerminatePosition, WithdrawSwapped};
use dca_exec::{ExecError, GatewayError};

fn increase(position_id: u64, delta_amount: u128, new_num_swaps: u64) -> ModifyPosition {
    ModifyPosition {
        position_id,
        delta_amount,
        new_num_swaps,
        approval: None,
        is_increase: true,
        use_native: false,
        native_value: 0,
    }
}

fn decrease(position_id: u64, delta_amount: u128, new_num_swaps: u64) -> ModifyPosition {
    ModifyPosition { is_increase: false, ..increase(position_id, delta_amount, new_num_swaps) }
}

fn terminate_to(position_id: u64, recipient: Address) -> TerminatePosition {
    TerminatePosition {
        position_id,
        swapped_recipient: recipient,
        unswapped_recipient: recipient,
        use_native: false,
    }
}

fn withdraw_to(position_id: u64, recipient: Address) -> WithdrawSwapped {
    WithdrawSwapped { position_id, recipient, use_native: false }
}

#[test]
fn test_create_position_escrows_and_schedules() {
    let h = Harness::new();

    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);

    assert_eq!(id, 1);
    assert_eq!(h.vault.total_positions().unwrap(), 1);
    assert_eq!(h.balance(token_a(), h.vault_address()), 100 * UNIT);
    assert_eq!(h.balance(token_a(), alice()), 0);

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.owner, alice());
    assert_eq!(details.rate, 10 * UNIT);
    assert_eq!(details.cadence, Some(Cadence::OneDay));
    assert_eq!(details.swaps_executed, 0);
    assert_eq!(details.swaps_left, 10);
    assert_eq!(details.unswapped, 100 * UNIT);

    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 10 * UNIT);
    assert_eq!(h.vault.delta_bucket(&daily_ab(), 11).unwrap(), 10 * UNIT);
    assert!(h.vault.active_cadences(&pair_ab()).unwrap().contains(Cadence::OneDay));

    let events = h.vault.events().unwrap();
    assert!(matches!(
        events.last().map(|stored| &stored.event),
        Some(Event::Created { position_id: 1, rate, .. }) if *rate == 10 * UNIT
    ));
}

#[test]
fn test_failed_pull_leaves_no_trace() {
    let h = Harness::new();
    let events_before = h.vault.events().unwrap().len();

    // Alice holds nothing and granted nothing
    let err = h
        .vault
        .create_position(alice(), Harness::create_request(100 * UNIT, 10, Cadence::OneDay))
        .unwrap_err();

    assert!(err.engine().is_none());
    assert_eq!(h.vault.total_positions().unwrap(), 0);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 0);
    assert_eq!(h.vault.delta_bucket(&daily_ab(), 11).unwrap(), 0);
    assert!(h.vault.active_cadences(&pair_ab()).unwrap().is_empty());
    assert_eq!(h.vault.events().unwrap().len(), events_before);
}

#[test]
fn test_modify_after_four_batches_respreads_remainder() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);

    h.swap().unwrap();
    h.run_batches(Cadence::OneDay, 3);

    let before = h.vault.get_position_details(id).unwrap();
    assert_eq!(before.unswapped, 60 * UNIT);
    assert_eq!(before.swapped, 38 * UNIT);

    h.fund(alice(), token_a(), 200 * UNIT);
    h.vault.modify_position(alice(), increase(id, 200 * UNIT, 20)).unwrap();

    let after = h.vault.get_position_details(id).unwrap();
    assert_eq!(after.rate, 13 * UNIT);
    assert_eq!(after.swaps_left, 20);
    assert_eq!(after.unswapped, 260 * UNIT);
    assert_eq!(after.swapped, 38 * UNIT);

    assert_eq!(h.vault.delta_bucket(&daily_ab(), 11).unwrap(), 0);
    assert_eq!(h.vault.delta_bucket(&daily_ab(), 25).unwrap(), 13 * UNIT);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 13 * UNIT);
    assert_eq!(h.balance(token_a(), h.vault_address()), 260 * UNIT);
}

#[test]
fn test_reduce_to_zero_forces_zero_swaps() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);

    h.vault.modify_position(alice(), decrease(id, 100 * UNIT, 5)).unwrap();

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.rate, 0);
    assert_eq!(details.swaps_left, 0);
    assert_eq!(details.unswapped, 0);
    assert_eq!(h.balance(token_a(), alice()), 100 * UNIT);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 0);
    assert!(!h.vault.active_cadences(&pair_ab()).unwrap().contains(Cadence::OneDay));
}

#[test]
fn test_reduction_beyond_remainder_rejected() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);
    h.swap().unwrap();

    let err = h.vault.modify_position(alice(), decrease(id, 91 * UNIT, 5)).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::InvalidAmount));

    let err = h.vault.modify_position(bob(), decrease(id, UNIT, 5)).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::UnauthorizedCaller));
}

#[test]
fn test_terminate_pays_both_legs_once() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);
    h.swap().unwrap();

    h.vault.terminate(alice(), terminate_to(id, bob())).unwrap();

    assert_eq!(h.balance(token_b(), bob()), 9_500_000_000_000_000_000);
    assert_eq!(h.balance(token_a(), bob()), 90 * UNIT);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 0);
    assert_eq!(h.vault.delta_bucket(&daily_ab(), 11).unwrap(), 0);

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.cadence, None);
    assert_eq!(details.swapped, 0);
    assert_eq!(details.unswapped, 0);

    let err = h.vault.terminate(alice(), terminate_to(id, bob())).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::InvalidPosition(id)));
}

#[test]
fn test_terminate_before_any_batch_returns_deposit() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);

    h.vault.terminate(alice(), terminate_to(id, alice())).unwrap();

    assert_eq!(h.balance(token_a(), alice()), 100 * UNIT);
    assert_eq!(h.balance(token_b(), alice()), 0);
    assert_eq!(h.balance(token_a(), h.vault_address()), 0);

    // Nothing left to swap for the pair
    let err = h.swap().unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::NoAvailableSwap));
}

#[test]
fn test_terminate_requires_recipients() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);

    let err = h.vault.terminate(alice(), terminate_to(id, Address::ZERO)).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::ZeroAddress));

    let native = TerminatePosition { use_native: true, ..terminate_to(id, alice()) };
    let err = h.vault.terminate(alice(), native).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::NotWNativeToken));
}

#[test]
fn test_withdraw_swapped_until_drained() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);
    h.swap().unwrap();
    h.run_batches(Cadence::OneDay, 1);

    let paid = h.vault.withdraw_swapped(alice(), withdraw_to(id, alice())).unwrap();
    assert_eq!(paid, 19 * UNIT);
    assert_eq!(h.balance(token_b(), alice()), 19 * UNIT);

    let err = h.vault.withdraw_swapped(alice(), withdraw_to(id, alice())).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::ZeroSwappedAmount));

    h.run_batches(Cadence::OneDay, 1);
    let paid = h.vault.withdraw_swapped(alice(), withdraw_to(id, alice())).unwrap();
    assert_eq!(paid, 9_500_000_000_000_000_000);

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.swaps_executed, 3);
    assert_eq!(details.unswapped, 70 * UNIT);
}

#[test]
fn test_position_completes_after_final_swap() {
    let h = Harness::new();
    let id = h.open(alice(), 30 * UNIT, 3, Cadence::OneDay);
    h.swap().unwrap();
    h.run_batches(Cadence::OneDay, 2);

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.swaps_left, 0);
    assert_eq!(details.unswapped, 0);
    assert_eq!(details.swapped, 28_500_000_000_000_000_000);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 0);

    h.advance(Cadence::OneDay);
    let err = h.swap().unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::NoAvailableSwap));
}

#[test]
fn test_pause_blocks_only_entry() {
    let h = Harness::new();
    let id = h.open(alice(), 100 * UNIT, 10, Cadence::OneDay);
    h.swap().unwrap();

    h.vault.pause(h.governor()).unwrap();

    h.fund(bob(), token_a(), 100 * UNIT);
    let err = h
        .vault
        .create_position(bob(), Harness::create_request(100 * UNIT, 10, Cadence::OneDay))
        .unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::Paused));

    h.fund(alice(), token_a(), 10 * UNIT);
    let err = h.vault.modify_position(alice(), increase(id, 10 * UNIT, 9)).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::Paused));

    // Exits stay open, and keepers keep swapping
    h.vault.modify_position(alice(), decrease(id, 18 * UNIT, 9)).unwrap();
    h.run_batches(Cadence::OneDay, 1);
    h.vault.withdraw_swapped(alice(), withdraw_to(id, alice())).unwrap();
    h.vault.terminate(alice(), terminate_to(id, alice())).unwrap();

    h.vault.unpause(h.governor()).unwrap();
    h.vault
        .create_position(bob(), Harness::create_request(100 * UNIT, 10, Cadence::OneDay))
        .unwrap();
}

#[test]
fn test_native_deposit_and_unwrapped_exit() {
    let h = Harness::new();
    h.tokens.fund_native(alice(), 100 * UNIT);

    let request = CreatePosition {
        token_in: Address::NATIVE,
        native_value: 100 * UNIT,
        ..Harness::create_request(100 * UNIT, 10, Cadence::OneDay)
    };
    let id = h.vault.create_position(alice(), request).unwrap();

    let details = h.vault.get_position_details(id).unwrap();
    assert_eq!(details.token_in, h.wrapped());
    assert_eq!(h.balance(h.wrapped(), h.vault_address()), 100 * UNIT);
    assert_eq!(h.tokens.native_balance_of(&alice()), 0);

    let native_top_up = ModifyPosition {
        use_native: true,
        native_value: 5 * UNIT,
        ..increase(id, 5 * UNIT, 10)
    };
    let err = h.vault.modify_position(alice(), native_top_up).unwrap_err();
    assert!(err.engine().is_none(), "no native balance left to wrap");

    let exit = TerminatePosition { use_native: true, ..terminate_to(id, alice()) };
    h.vault.terminate(alice(), exit).unwrap();

    assert_eq!(h.tokens.native_balance_of(&alice()), 100 * UNIT);
    assert_eq!(h.balance(h.wrapped(), h.vault_address()), 0);
}

#[test]
fn test_native_value_must_match_deposit() {
    let h = Harness::new();
    h.tokens.fund_native(alice(), 100 * UNIT);

    let request = CreatePosition {
        token_in: Address::NATIVE,
        native_value: 99 * UNIT,
        ..Harness::create_request(100 * UNIT, 10, Cadence::OneDay)
    };
    let err = h.vault.create_position(alice(), request).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::InvalidAmount));
    assert_eq!(h.tokens.native_balance_of(&alice()), 100 * UNIT);
}

#[test]
fn test_signed_approval_funds_position_once() {
    let h = Harness::new();
    h.tokens.mint(token_a(), alice(), 200 * UNIT);
    let deadline = Harness::start() + Duration::hours(1);
    let proof = h.approvals.issue(alice(), h.vault_address(), token_a(), 100 * UNIT, 1, deadline);

    let request = CreatePosition {
        approval: Some(proof),
        ..Harness::create_request(100 * UNIT, 10, Cadence::OneDay)
    };
    let id = h.vault.create_position(alice(), request.clone()).unwrap();
    assert_eq!(h.vault.get_position_details(id).unwrap().unswapped, 100 * UNIT);

    // Replayed proof: rejected and fully rolled back
    let err = h.vault.create_position(alice(), request).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::InvalidPermit));
    assert_eq!(h.vault.total_positions().unwrap(), 1);
    assert_eq!(h.vault.schedule(&daily_ab()).unwrap().next_amount_to_swap, 10 * UNIT);
    assert_eq!(h.balance(token_a(), alice()), 100 * UNIT);
}

#[test]
fn test_failed_pull_releases_approval() {
    let h = Harness::new();
    h.tokens.mint(token_a(), alice(), 50 * UNIT);
    let deadline = Harness::start() + Duration::hours(1);
    let proof = h.approvals.issue(alice(), h.vault_address(), token_a(), 100 * UNIT, 3, deadline);
    let request = CreatePosition {
        approval: Some(proof),
        ..Harness::create_request(100 * UNIT, 10, Cadence::OneDay)
    };

    // Underfunded: the pull fails after the proof was checked
    let err = h.vault.create_position(alice(), request.clone()).unwrap_err();
    assert!(matches!(err, ExecError::Gateway(GatewayError::InsufficientBalance { .. })));
    assert_eq!(h.vault.total_positions().unwrap(), 0);

    // Same proof still usable once funded
    h.tokens.mint(token_a(), alice(), 50 * UNIT);
    let id = h.vault.create_position(alice(), request).unwrap();
    assert_eq!(h.vault.get_position_details(id).unwrap().unswapped, 100 * UNIT);
    assert_eq!(h.balance(token_a(), alice()), 0);
}

#[test]
fn test_expired_approval_rejected() {
    let h = Harness::new();
    h.tokens.mint(token_a(), alice(), 100 * UNIT);
    let deadline = Harness::start() - Duration::seconds(1);
    let proof = h.approvals.issue(alice(), h.vault_address(), token_a(), 100 * UNIT, 7, deadline);

    let request = CreatePosition {
        approval: Some(proof),
        ..Harness::create_request(100 * UNIT, 10, Cadence::OneDay)
    };
    let err = h.vault.create_position(alice(), request).unwrap_err();
    assert_eq!(err.engine(), Some(&EngineError::InvalidPermit));
    assert_eq!(h.vault.total_positions().unwrap(), 0);
}
