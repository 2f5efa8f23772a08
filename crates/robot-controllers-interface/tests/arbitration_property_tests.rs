//! 仲裁的属性测试
//!
//! 使用 proptest 验证：对任意的声明集合与启动/停止序列，
//! 管理器的行为与简单的集合模型一致，且每个关节至多一个运行中的占用者。

mod common;

use common::*;
use proptest::prelude::*;
use robot_controllers_interface::{ControllerManager, ControllerState, ManagerConfig};
use std::collections::BTreeSet;

const JOINTS: [&str; 4] = ["j0", "j1", "j2", "j3"];

fn claims_of(mask: u8) -> Vec<&'static str> {
    JOINTS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, name)| *name)
        .collect()
}

fn build(masks: &[u8]) -> ControllerManager {
    let mut manager = ControllerManager::new();
    add_joints(&mut manager, &JOINTS);
    let mut config = ManagerConfig::default();
    for (i, mask) in masks.iter().enumerate() {
        config = config.with_controller(format!("c{}", i), mock_params(&claims_of(*mask)));
    }
    manager.init(&config, &mock_registry(new_log())).unwrap();
    manager
}

proptest! {
    /// 启动/停止序列的结果与集合模型一致
    #[test]
    fn arbitration_matches_model(
        masks in prop::collection::vec(0u8..16, 1..6),
        ops in prop::collection::vec((any::<bool>(), 0usize..6), 0..40),
    ) {
        let manager = build(&masks);
        let mut running: BTreeSet<usize> = BTreeSet::new();

        for (start, raw) in ops {
            let index = raw % masks.len();
            let name = format!("c{}", index);
            let before = manager.controller_state(&name);

            if start {
                let blocked = running
                    .iter()
                    .any(|&other| other != index && masks[other] & masks[index] != 0);
                let result = manager.request_start(&name);
                if blocked && !running.contains(&index) {
                    prop_assert_eq!(result.unwrap_err().code(), -2);
                    // 失败的请求不改变状态
                    prop_assert_eq!(manager.controller_state(&name), before);
                } else {
                    prop_assert!(result.is_ok());
                    running.insert(index);
                }
            } else {
                prop_assert!(manager.request_stop(&name).is_ok());
                running.remove(&index);
            }

            // 每个关节至多一个运行中的占用者
            for bit in 0..JOINTS.len() {
                let holders = running.iter().filter(|&&c| masks[c] & (1 << bit) != 0).count();
                prop_assert!(holders <= 1);
            }

            let expected: Vec<String> = running.iter().map(|c| format!("c{}", c)).collect();
            prop_assert_eq!(manager.running_controllers(), expected);
        }
    }

    /// 停止对任意状态都是幂等的
    #[test]
    fn stop_is_idempotent(mask in 0u8..16, started in any::<bool>(), repeats in 1usize..5) {
        let manager = build(&[mask]);
        if started {
            manager.request_start("c0").unwrap();
        }
        manager.request_stop("c0").unwrap();
        let state = manager.controller_state("c0");

        for _ in 0..repeats {
            prop_assert!(manager.request_stop("c0").is_ok());
            prop_assert_eq!(manager.controller_state("c0"), state);
        }
        let expected = if started {
            ControllerState::Stopped
        } else {
            ControllerState::Initialized
        };
        prop_assert_eq!(state, Some(expected));
    }
}
