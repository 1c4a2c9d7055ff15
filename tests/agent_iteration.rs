//! End-to-end training iterations on the built-in environments

use std::{
    fs,
    io::{BufRead, BufReader},
};

use trpo_rl::{
    train::{AgentConfig, StepStatus, TrpoAgent, TrpoConfig},
    utils::JsonLinesSink,
};

#[test]
fn test_cartpole_iterations_log_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("metrics.jsonl");

    let config = AgentConfig::new("CartPole-v1")
        .min_batch_size(256)
        .num_workers(2)
        .hidden_sizes(vec![32])
        .trpo(TrpoConfig::new().value_batch_size(64));
    let max_kl = config.trpo.max_kl;
    let mut agent = TrpoAgent::from_config(config).unwrap();

    {
        let mut sink = JsonLinesSink::create(&log_path).unwrap();
        for iteration in 0..3 {
            let stats = agent.learn(iteration, &mut sink).unwrap();
            assert_eq!(stats.iteration, iteration);
            assert!(stats.collect.num_steps >= 256);
            assert!(stats.collect.num_episodes > 0);
            assert!(stats.update.value.loss_after.is_finite());

            let policy = &stats.update.policy;
            if policy.status == StepStatus::Accepted {
                assert!(policy.kl <= max_kl * (1.0 + 1e-6));
                assert!(policy.surrogate_after >= policy.surrogate_before);
            }
        }
    }

    let reward = agent.evaluate(3).unwrap();
    assert!(reward >= 1.0);

    let lines: Vec<String> =
        BufReader::new(fs::File::open(&log_path).unwrap()).lines().map(|l| l.unwrap()).collect();
    assert!(!lines.is_empty());
    for line in &lines {
        let record: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(record.get("step").is_some());
    }
    agent.close();
}

#[test]
fn test_pendulum_iteration() {
    let config = AgentConfig::new("Pendulum-v1")
        .min_batch_size(200)
        .num_workers(1)
        .hidden_sizes(vec![32])
        .trpo(TrpoConfig::new().value_batch_size(50));
    let mut agent = TrpoAgent::from_config(config).unwrap();

    let stats = agent.learn(0, &mut trpo_rl::utils::NullSink).unwrap();
    // Pendulum episodes are truncated at 200 steps
    assert_eq!(stats.collect.num_steps, 200);
    assert_eq!(stats.collect.num_episodes, 1);
    assert!(stats.collect.total_reward <= 0.0);
    assert!(agent.evaluate(0).unwrap() <= 0.0);
}
