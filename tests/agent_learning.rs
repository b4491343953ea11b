use std::sync::Arc;

use tradegym::rl::training::episode_name;
use tradegym::rl::{
    evaluate, generate_sample_data, run_episode, summarize_results, train, Checkpointer,
    EnvironmentConfig, Experience, RLConfig, SampleDataConfig, TradingAgent, TradingEnvironment,
    STATE_SIZE,
};
use tradegym::TradeGymError;

fn small_agent(seed: u64) -> TradingAgent {
    TradingAgent::new(RLConfig {
        hidden_sizes: vec![16, 8],
        batch_size: 32,
        buffer_size: 512,
        epsilon_decay: 0.9,
        epsilon_min: 0.5,
        seed: Some(seed),
        ..Default::default()
    })
    .unwrap()
}

fn market(seed: u64) -> TradingEnvironment {
    let data = Arc::new(
        generate_sample_data(&SampleDataConfig {
            bars: 500,
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap(),
    );
    let config = EnvironmentConfig {
        max_steps: 120,
        ..Default::default()
    };
    TradingEnvironment::new(config, data).unwrap().with_seed(seed)
}

/// Roll out `steps` transitions into the agent's buffer
fn collect(agent: &mut TradingAgent, env: &mut TradingEnvironment, steps: usize) {
    let mut state = env.reset().unwrap();
    for _ in 0..steps {
        let selection = agent.select_action(&state).unwrap();
        let result = env.step(selection.action).unwrap();
        agent.store_experience(Experience::new(
            state,
            selection.action,
            result.reward,
            result.state.clone(),
            result.done,
            selection.log_prob,
        ));
        state = if result.done {
            env.reset().unwrap()
        } else {
            result.state
        };
    }
}

#[test]
fn learning_needs_a_full_batch() {
    let mut agent = small_agent(1);
    let mut env = market(1);
    collect(&mut agent, &mut env, 10);

    assert!(matches!(
        agent.learn(),
        Err(TradeGymError::InsufficientExperience {
            available: 10,
            required: 32
        })
    ));
    assert_eq!(agent.buffer().len(), 10);
    assert_eq!(agent.training_step(), 0);
}

#[test]
fn epsilon_decays_to_its_floor() {
    let mut agent = small_agent(2);
    let mut env = market(2);
    let mut previous = agent.epsilon();

    for _ in 0..12 {
        collect(&mut agent, &mut env, 40);
        let metrics = agent.learn().unwrap();

        assert!(metrics.epsilon <= previous);
        assert!(metrics.epsilon >= 0.5);
        previous = metrics.epsilon;
    }

    assert!((agent.epsilon() - 0.5).abs() < 1e-12);
    assert_eq!(agent.training_step(), 12 * agent.config().ppo_epochs);
}

#[test]
fn advantages_are_normalized() {
    let mut agent = small_agent(3);
    let mut env = market(3);
    collect(&mut agent, &mut env, 64);

    let metrics = agent.learn().unwrap();
    assert_eq!(metrics.steps, 64);
    assert!(metrics.advantage_mean.abs() < 1e-6);
    assert!((metrics.advantage_std - 1.0).abs() < 1e-3);
    assert!(metrics.entropy >= 0.0);
    assert!(agent.buffer().is_empty());
}

#[test]
fn policy_probabilities_form_a_distribution() {
    let agent = small_agent(4);
    let mut env = market(4);
    let mut state = env.reset().unwrap();

    for _ in 0..30 {
        assert_eq!(state.features().len(), STATE_SIZE);
        let output = agent.policy_network().forward(state.features()).unwrap();
        let total: f64 = output.action_probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(output.action_probs.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(output.entropy >= 0.0);

        let action = agent.greedy_action(&state).unwrap();
        let result = env.step(action).unwrap();
        if result.done {
            break;
        }
        state = result.state;
    }
}

#[test]
fn train_checkpoint_and_evaluate() {
    let dir = std::env::temp_dir().join(format!("tradegym_it_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    let checkpointer = Checkpointer::new(&dir, 3).unwrap();

    let mut agent = small_agent(5);
    let mut env = market(5);
    let results = train(&mut agent, &mut env, 4, Some(&checkpointer), 2).unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(agent.episode_count(), 4);
    assert!(checkpointer.exists(&episode_name("ppo", 2)));
    assert!(checkpointer.exists(&episode_name("ppo", 4)));

    let summary = summarize_results(&results);
    assert_eq!(summary.num_episodes, 4);
    assert!(summary.best_return >= summary.worst_return);
    assert!((0.0..=1.0).contains(&summary.episode_win_rate));

    let latest = checkpointer.latest_checkpoint().unwrap();
    let restored = TradingAgent::from_snapshot(&checkpointer.load(&latest).unwrap()).unwrap();
    assert_eq!(restored.training_step(), agent.training_step());

    let evaluation = evaluate(&restored, &mut market(6), 2).unwrap();
    assert_eq!(evaluation.len(), 2);
    assert!(evaluation.iter().all(|r| r.training.is_none()));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn single_episode_reports_its_outcome() {
    let mut agent = small_agent(7);
    let mut env = market(7);
    let result = run_episode(&mut agent, &mut env).unwrap();

    assert!(result.steps > 0 && result.steps <= 120);
    assert_eq!(result.steps, env.step_count());
    assert!((result.final_portfolio_value - env.portfolio().portfolio_value).abs() < 1e-9);
    assert_eq!(agent.episode_rewards().len(), 1);
}
