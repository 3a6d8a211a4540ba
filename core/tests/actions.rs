use idlekeep_core::{
    action::{self, ActionContext},
    command::{CommandReceipt, PlayerCommand},
    config::SimConfig,
    engine::Engine,
    error::Rejection,
    event::{EngineEvent, EventKind},
    state::{Currency, GameState, SettingKey},
};
use std::sync::{Arc, Mutex};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_engine() -> Engine {
    Engine::fresh(SimConfig::default_test(), 0)
}

fn with_currency(engine: &mut Engine, amount: f64) {
    let mut state = engine.snapshot();
    state.currency = amount;
    engine.replace_state(state);
}

fn assert_non_negative(state: &GameState) {
    assert!(state.currency >= 0.0, "currency={}", state.currency);
    assert!(state.premium_currency >= 0.0, "premium={}", state.premium_currency);
    assert!(state.progression_currency >= 0.0, "progression={}", state.progression_currency);
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Farm costs 100: 99 is not enough, exactly 100 leaves 0.
#[test]
fn affordability_guard_is_exact() {
    let mut engine = make_engine();
    with_currency(&mut engine, 99.0);
    let buy = PlayerCommand::BuyGenerator { id: "farm".into(), quantity: 1 };

    let err = engine.execute(&buy, 0).unwrap_err();
    assert!(matches!(err, Rejection::InsufficientFunds { currency: Currency::Primary, .. }));
    assert_eq!(engine.state().currency, 99.0);
    assert_eq!(engine.state().generator("farm").unwrap().count, 0);

    with_currency(&mut engine, 100.0);
    engine.execute(&buy, 0).unwrap();
    assert_eq!(engine.state().currency, 0.0);
    assert_eq!(engine.state().generator("farm").unwrap().count, 1);
}

#[test]
fn rejection_leaves_state_untouched() {
    let mut engine = make_engine();
    with_currency(&mut engine, 10.0);
    let before = engine.snapshot();

    let rejected = [
        PlayerCommand::BuyGenerator { id: "nope".into(), quantity: 1 },
        PlayerCommand::BuyGenerator { id: "farm".into(), quantity: 0 },
        PlayerCommand::BuyUpgrade { id: "efficiency".into() },
        PlayerCommand::BuySecondaryUpgrade { id: "lean_labs".into() },
        PlayerCommand::UnlockTheme { id: "midnight".into() },
        PlayerCommand::ActivateTheme { id: "midnight".into() },
        PlayerCommand::Prestige,
    ];
    for cmd in &rejected {
        assert!(engine.execute(cmd, 0).is_err(), "{} should be rejected", cmd.name());
        assert_eq!(engine.state(), &before, "{} changed state", cmd.name());
    }
}

#[test]
fn click_earns_click_power_and_counts() {
    let mut engine = make_engine();
    let receipt = engine.execute(&PlayerCommand::Click, 0).unwrap();
    assert_eq!(receipt, CommandReceipt::Clicked { earned: 1.0 });
    assert_eq!(engine.state().currency, 1.0);
    assert_eq!(engine.state().stats.total_clicks, 1);
    assert_eq!(engine.state().stats.total_earned, 1.0);
}

/// Bulk purchase buys as many as it can and reports the count.
#[test]
fn bulk_purchase_is_best_effort() {
    let mut engine = make_engine();
    // cursor: 15, 17, 19, 22 ... → 15 + 17 + 19 = 51
    with_currency(&mut engine, 55.0);
    let receipt = engine
        .execute(&PlayerCommand::BuyGenerator { id: "cursor".into(), quantity: 10 }, 0)
        .unwrap();
    assert_eq!(
        receipt,
        CommandReceipt::Purchased { id: "cursor".into(), requested: 10, purchased: 3 }
    );
    assert_eq!(engine.state().generator("cursor").unwrap().count, 3);
    assert_eq!(engine.state().currency, 4.0);
}

#[test]
fn tiered_upgrade_stops_at_max() {
    let mut engine = make_engine();
    with_currency(&mut engine, 100.0 + 500.0 + 2_500.0 + 10_000.0);
    let buy = PlayerCommand::BuyUpgrade { id: "reinforced_fingers".into() };

    for expected in 1..=3 {
        let receipt = engine.execute(&buy, 0).unwrap();
        assert_eq!(receipt, CommandReceipt::UpgradeLevel { id: "reinforced_fingers".into(), level: expected });
    }
    let err = engine.execute(&buy, 0).unwrap_err();
    assert_eq!(err, Rejection::AlreadyMaxed { id: "reinforced_fingers".into() });
    assert_eq!(engine.state().currency, 10_000.0);
    assert!(engine.state().upgrade("reinforced_fingers").unwrap().level.is_maxed());
}

#[test]
fn infinite_upgrade_keeps_levelling() {
    let config = SimConfig::default_test();
    let mut state = GameState::new(&config.catalog, 0);
    state.currency = 1e9;
    for level in 1..=20 {
        let (next, got) = action::buy_upgrade(&state, "efficiency").unwrap();
        assert_eq!(got, level);
        state = next;
    }
    assert!(state.upgrade("efficiency").unwrap().level.is_infinite());
}

#[test]
fn secondary_upgrades_cost_progression_currency() {
    let mut engine = make_engine();
    let mut state = engine.snapshot();
    state.currency = 1_000.0;
    state.progression_currency = 50.0;
    engine.replace_state(state);

    engine
        .execute(&PlayerCommand::BuySecondaryUpgrade { id: "lean_labs".into() }, 0)
        .unwrap();
    assert_eq!(engine.state().progression_currency, 0.0);
    assert_eq!(engine.state().currency, 1_000.0);

    engine
        .execute(&PlayerCommand::BuySecondaryGenerator { id: "lab".into(), quantity: 1 }, 0)
        .unwrap();
    assert_eq!(engine.state().currency, 800.0);
}

#[test]
fn themes_unlock_with_premium_and_activate_exclusively() {
    let mut engine = make_engine();
    let mut state = engine.snapshot();
    state.premium_currency = 4.0;
    engine.replace_state(state);

    engine.execute(&PlayerCommand::UnlockTheme { id: "midnight".into() }, 0).unwrap();
    engine.execute(&PlayerCommand::UnlockTheme { id: "aurora".into() }, 0).unwrap();
    assert_eq!(engine.state().premium_currency, 0.0);
    assert_eq!(
        engine.execute(&PlayerCommand::UnlockTheme { id: "aurora".into() }, 0),
        Err(Rejection::AlreadyUnlocked { id: "aurora".into() })
    );

    engine.execute(&PlayerCommand::ActivateTheme { id: "midnight".into() }, 0).unwrap();
    engine.execute(&PlayerCommand::ActivateTheme { id: "aurora".into() }, 0).unwrap();
    let active: Vec<_> = engine.state().themes.iter().filter(|t| t.active).map(|t| t.id.as_str()).collect();
    assert_eq!(active, vec!["aurora"]);

    engine.execute(&PlayerCommand::DeactivateTheme, 0).unwrap();
    assert!(engine.state().active_theme().is_none());
}

#[test]
fn prestige_resets_and_awards() {
    let mut engine = make_engine();
    let mut state = engine.snapshot();
    state.currency = 4_500_000.0; // sqrt(4.5) → 2
    state.generators[0].count = 12;
    state.progression_currency = 7.0;
    state.stats.total_earned = 4_500_000.0;
    engine.replace_state(state);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on(EventKind::Prestige, move |e| sink.lock().unwrap().push(e.clone()));

    let receipt = engine.execute(&PlayerCommand::Prestige, 0).unwrap();
    assert_eq!(receipt, CommandReceipt::Prestiged { gain: 2.0 });

    let s = engine.state();
    assert_eq!(s.currency, 0.0);
    assert_eq!(s.generators[0].count, 0);
    assert_eq!(s.prestige_level, 2.0);
    assert_eq!(s.premium_currency, 2.0);
    assert_eq!(s.progression_currency, 7.0);
    assert_eq!(s.stats.prestige_count, 1);
    assert_eq!(s.stats.total_earned, 4_500_000.0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[EngineEvent::Prestiged { gain: 2.0, prestige_level: 2.0 }]);
}

#[test]
fn settings_toggle() {
    let mut engine = make_engine();
    engine
        .execute(&PlayerCommand::SetSetting { key: SettingKey::Autosave, value: false }, 0)
        .unwrap();
    assert!(!engine.state().settings.autosave);
    assert!(engine.state().settings.offline_progress);
}

#[test]
fn random_action_sequence_never_goes_negative() {
    let mut engine = make_engine();
    let script = [
        PlayerCommand::Click,
        PlayerCommand::BuyGenerator { id: "cursor".into(), quantity: 5 },
        PlayerCommand::BuyUpgrade { id: "efficiency".into() },
        PlayerCommand::BuySecondaryGenerator { id: "lab".into(), quantity: 2 },
        PlayerCommand::BuySecondaryUpgrade { id: "grant_writing".into() },
        PlayerCommand::BuyGenerator { id: "farm".into(), quantity: 3 },
    ];
    let mut now = 0;
    for round in 0..200 {
        for _ in 0..10 {
            let _ = engine.execute(&PlayerCommand::Click, now);
        }
        let _ = engine.execute(&script[round % script.len()], now);
        now += 1_000;
        engine.tick(now).unwrap();
        assert_non_negative(engine.state());
    }
}

#[test]
fn subscribers_see_changes_until_unsubscribed() {
    let mut engine = make_engine();
    let count = Arc::new(Mutex::new(0u32));
    let sink = Arc::clone(&count);
    let id = engine.subscribe(move |_| *sink.lock().unwrap() += 1);

    engine.execute(&PlayerCommand::Click, 0).unwrap();
    engine.tick(250).unwrap();
    assert_eq!(*count.lock().unwrap(), 2);

    // Rejected actions notify nobody.
    let _ = engine.execute(&PlayerCommand::BuyUpgrade { id: "efficiency".into() }, 250);
    assert_eq!(*count.lock().unwrap(), 2);

    assert!(engine.unsubscribe(id));
    assert!(!engine.unsubscribe(id));
    engine.execute(&PlayerCommand::Click, 250).unwrap();
    assert_eq!(*count.lock().unwrap(), 2);
}

#[test]
fn custom_intents_go_through_execute_action() {
    let mut engine = make_engine();
    with_currency(&mut engine, 500.0);
    let ctx_config = engine.config().clone();
    let bought = engine
        .execute_action(|s| action::buy_generators(s, "farm", 2))
        .unwrap();
    assert_eq!(bought, 2);

    let err = engine
        .execute_action(|s| {
            let ctx = ActionContext { config: &ctx_config, now: 0 };
            let (mut next, _) = action::click(s, &ctx)?;
            next.currency = -1.0;
            Ok((next, ()))
        })
        .unwrap_err();
    assert!(matches!(err, Rejection::InvariantViolated(_)));
    assert_eq!(engine.state().generator("farm").unwrap().count, 2);
}
