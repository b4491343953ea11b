use std::sync::Arc;

use tradegym::rl::{
    generate_sample_data, Action, ActionType, EnvironmentConfig, PriceSeries, SampleDataConfig,
    TradingEnvironment, STATE_SIZE,
};
use tradegym::TradeGymError;

fn fixed_start() -> EnvironmentConfig {
    EnvironmentConfig {
        random_start: false,
        ..Default::default()
    }
}

fn flat_env(bars: usize) -> TradingEnvironment {
    let data = Arc::new(PriceSeries::flat(bars, 100.0, 1_000_000.0).unwrap());
    TradingEnvironment::new(fixed_start(), data).unwrap()
}

#[test]
fn holding_a_flat_market_runs_to_max_steps() {
    let mut env = flat_env(1300);
    env.reset().unwrap();

    let mut steps = 0;
    loop {
        let result = env.step(Action::hold()).unwrap();
        steps += 1;
        assert!(result.reward.abs() < 1e-9, "step {steps} reward {}", result.reward);
        if result.done {
            break;
        }
        assert!(steps < 5000, "episode never finished");
    }

    assert_eq!(steps, 1000);
    assert_eq!(env.step_count(), 1000);
    assert!(env.is_done());
    assert!((env.portfolio().portfolio_value - 100_000.0).abs() < 1e-9);
}

#[test]
fn short_flat_market_ends_when_data_runs_out() {
    let mut env = flat_env(500);
    env.reset().unwrap();
    let start = env.start_index();

    let mut last = None;
    for _ in 0..2000 {
        let result = env.step(Action::hold()).unwrap();
        let done = result.done;
        last = Some(result);
        if done {
            break;
        }
    }

    let last = last.unwrap();
    assert!(last.done);
    assert_eq!(env.current_index(), 499);
    assert_eq!(env.step_count(), 499 - start);
    assert!(env.step_count() < 1000);
}

#[test]
fn step_after_done_is_terminal_and_inert() {
    let mut env = flat_env(30);
    env.reset().unwrap();
    while !env.step(Action::hold()).unwrap().done {}

    let index = env.current_index();
    let value = env.portfolio().portfolio_value;
    let result = env.step(Action::new(ActionType::BuyLarge)).unwrap();

    assert!(result.done);
    assert_eq!(result.reward, 0.0);
    assert_eq!(env.current_index(), index);
    assert_eq!(env.portfolio().portfolio_value, value);
}

#[test]
fn step_before_reset_is_rejected() {
    let mut env = flat_env(100);
    assert!(matches!(
        env.step(Action::hold()),
        Err(TradeGymError::InvalidState(_))
    ));
    assert!(env.state().is_err());
}

#[test]
fn ledger_balances_on_every_step() {
    let data = Arc::new(
        generate_sample_data(&SampleDataConfig {
            bars: 600,
            seed: Some(42),
            ..Default::default()
        })
        .unwrap(),
    );
    let mut env = TradingEnvironment::new(fixed_start(), data).unwrap();
    let state = env.reset().unwrap();
    assert_eq!(state.features().len(), STATE_SIZE);

    let cycle = [
        ActionType::BuyLarge,
        ActionType::Hold,
        ActionType::BuyMedium,
        ActionType::SellSmall,
        ActionType::BuySmall,
        ActionType::SellLarge,
        ActionType::SellMedium,
    ];

    for action_type in cycle.iter().cycle().take(400) {
        let result = env.step(Action::new(*action_type)).unwrap();
        let portfolio = env.portfolio();
        let expected = portfolio.cash + portfolio.positions as f64 * env.current_price();

        assert!((portfolio.portfolio_value - expected).abs() < 1e-6);
        assert!((result.info.portfolio_value - expected).abs() < 1e-6);
        assert!(portfolio.cash >= -1e-6);
        assert_eq!(result.state.features().len(), STATE_SIZE);
        assert!(result.state.features().iter().all(|f| f.is_finite()));
        if result.done {
            break;
        }
    }

    assert!(env.trades() > 0);
    assert!(env.total_transaction_costs() > 0.0);
}

#[test]
fn random_starts_leave_room_for_an_episode() {
    let data = Arc::new(PriceSeries::flat(1500, 50.0, 10_000.0).unwrap());
    let config = EnvironmentConfig::default();
    let mut env = TradingEnvironment::new(config.clone(), data).unwrap().with_seed(3);

    for _ in 0..50 {
        let start = env.sample_start();
        assert!(start >= config.lookback_window - 1);
        assert!(start <= 1500 - (config.min_remaining_bars + 1));
    }
}
