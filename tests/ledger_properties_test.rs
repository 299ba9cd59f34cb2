// ==========================================
// 账本性质 - 合计、流水、冗余字段
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod ledger_properties_test {
    use super::test_helpers::*;
    use budget_commitment::api::Decision;
    use budget_commitment::app::AppState;
    use budget_commitment::config::config_keys;
    use budget_commitment::domain::availability::{AlertLevel, AvailabilityBreakdown};
    use budget_commitment::domain::types::MovementType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn breakdown(env: &TestEnv, line_id: &str) -> AvailabilityBreakdown {
        env.state
            .commitment_api
            .get_availability(line_id, EXERCICE)
            .unwrap()
    }

    /// 落库字段与重新计算的明细一致
    fn assert_denormalized_matches(env: &TestEnv, line_id: &str) {
        let b = breakdown(env, line_id);
        let line = env
            .state
            .budget_api
            .list_budget_lines(EXERCICE)
            .unwrap()
            .into_iter()
            .find(|l| l.budget_line_id == line_id)
            .unwrap();
        assert_eq!(line.current_allocation, b.dotation_actuelle);
        assert_eq!(line.cumulative_committed, b.cumul_engage);
        assert_eq!(line.reserved_amount, b.montant_reserve);
    }

    #[test]
    fn test_reserve_then_release_restores_line() {
        let env = TestEnv::new();
        let line = env.seed_line("6301", dec!(800));
        let before = breakdown(&env, &line.budget_line_id);

        let submitted = env
            .state
            .commitment_api
            .submit_new(&single(&line.budget_line_id, dec!(320.45)), &agent())
            .unwrap();
        assert_eq!(
            breakdown(&env, &line.budget_line_id).disponible_net,
            dec!(479.55)
        );
        assert_denormalized_matches(&env, &line.budget_line_id);

        env.state
            .commitment_api
            .cancel_commitment(&submitted.request_id, Some("Annule".to_string()), &agent())
            .unwrap();

        let after = breakdown(&env, &line.budget_line_id);
        assert_eq!(after, before);
        assert_denormalized_matches(&env, &line.budget_line_id);
    }

    #[test]
    fn test_reserve_then_convert_keeps_net() {
        let env = TestEnv::new();
        let line = env.seed_line("6302", dec!(800));

        let submitted = env
            .state
            .commitment_api
            .submit_new(&single(&line.budget_line_id, dec!(300)), &agent())
            .unwrap();
        let reserved = breakdown(&env, &line.budget_line_id);

        env.state
            .commitment_api
            .decide_commitment(&submitted.request_id, Decision::Validate, None, None, &controller())
            .unwrap();
        let converted = breakdown(&env, &line.budget_line_id);

        assert_eq!(converted.disponible_net, reserved.disponible_net);
        assert_eq!(converted.cumul_engage, reserved.cumul_engage + dec!(300));
        assert_eq!(converted.montant_reserve, reserved.montant_reserve - dec!(300));
        assert_denormalized_matches(&env, &line.budget_line_id);
    }

    #[test]
    fn test_movement_journal_records_each_step() {
        let env = TestEnv::new();
        let line = env.seed_line("6303", dec!(1000));

        let rejected = env
            .state
            .commitment_api
            .submit_new(&single(&line.budget_line_id, dec!(200)), &agent())
            .unwrap();
        env.state
            .commitment_api
            .decide_commitment(
                &rejected.request_id,
                Decision::Reject,
                Some("Non eligible".to_string()),
                None,
                &controller(),
            )
            .unwrap();
        let validated = env.commit(&line.budget_line_id, dec!(150));

        let movements = env
            .state
            .budget_api
            .list_movements(&line.budget_line_id)
            .unwrap();
        let kinds: Vec<MovementType> = movements.iter().map(|m| m.movement_type).collect();
        assert_eq!(
            kinds,
            vec![
                MovementType::Reservation,
                MovementType::Release,
                MovementType::Reservation,
                MovementType::Conversion,
            ]
        );

        assert_eq!(movements[0].delta, dec!(200));
        assert_eq!(movements[0].disponible_avant, dec!(1000));
        assert_eq!(movements[0].disponible_apres, dec!(800));
        assert_eq!(movements[1].delta, dec!(-200));
        assert_eq!(movements[1].disponible_apres, dec!(1000));
        assert_eq!(movements[3].ref_id, validated);
        assert_eq!(movements[3].disponible_avant, movements[3].disponible_apres);

        // 每行都从上一行结束处接续
        for pair in movements.windows(2) {
            assert_eq!(pair[0].disponible_apres, pair[1].disponible_avant);
        }
    }

    #[test]
    fn test_summary_counts_overdrawn_lines() {
        let env = TestEnv::new();
        let a = env.seed_line("6304", dec!(1000));
        let b = env.seed_line("6305", dec!(500));

        env.commit(&a.budget_line_id, dec!(250));
        env.state
            .commitment_api
            .submit_new(
                &single(&b.budget_line_id, dec!(600)).forced_with("Depense obligatoire urgente"),
                &agent(),
            )
            .unwrap();

        let summary = env.state.budget_api.get_budget_summary(EXERCICE).unwrap();
        assert_eq!(summary.nb_lignes, 2);
        assert_eq!(summary.nb_lignes_depassement, 1);
        assert_eq!(summary.total_dotation_actuelle, dec!(1500));
        assert_eq!(summary.total_engage, dec!(250));
        assert_eq!(summary.total_reserve, dec!(600));
        assert_eq!(summary.total_disponible, dec!(650));
    }

    #[test]
    fn test_inactive_line_leaves_summary_and_refuses_allocations() {
        let env = TestEnv::new();
        let a = env.seed_line("6306", dec!(1000));
        let b = env.seed_line("6307", dec!(1000));

        env.state
            .budget_api
            .set_line_active(&b.budget_line_id, false, &admin())
            .unwrap();

        let summary = env.state.budget_api.get_budget_summary(EXERCICE).unwrap();
        assert_eq!(summary.nb_lignes, 1);
        assert_eq!(summary.total_dotation_initiale, dec!(1000));

        assert!(env
            .state
            .commitment_api
            .submit_new(&single(&b.budget_line_id, dec!(10)), &agent())
            .is_err());
        assert!(env
            .state
            .commitment_api
            .submit_new(&single(&a.budget_line_id, dec!(10)), &agent())
            .is_ok());
    }

    #[test]
    fn test_zero_allocation_line() {
        let env = TestEnv::new();
        let line = env.seed_line("6308", Decimal::ZERO);
        let b = breakdown(&env, &line.budget_line_id);
        assert_eq!(b.disponible_net, Decimal::ZERO);
        assert_eq!(b.taux_engagement, Decimal::ZERO);

        let preview = env
            .state
            .commitment_api
            .validate_commitment(&single(&line.budget_line_id, dec!(1)))
            .unwrap();
        assert!(!preview.ok);
        assert_eq!(preview.deficit, dec!(1));
    }

    // ==========================================
    // 消耗预警
    // ==========================================

    #[test]
    fn test_alerts_grade_committed_consumption() {
        let env = TestEnv::new();
        let warning = env.seed_line("6401", dec!(1000));
        let critical = env.seed_line("6402", dec!(1000));
        let blocking = env.seed_line("6403", dec!(500));
        let quiet = env.seed_line("6404", dec!(1000));
        let reserved = env.seed_line("6405", dec!(1000));

        env.commit(&warning.budget_line_id, dec!(800));
        env.commit(&critical.budget_line_id, dec!(960));
        env.commit(&blocking.budget_line_id, dec!(500));
        env.commit(&quiet.budget_line_id, dec!(799));
        // 只预留,未承诺
        env.state
            .commitment_api
            .submit_new(&single(&reserved.budget_line_id, dec!(950)), &agent())
            .unwrap();

        let alerts = env.state.budget_api.list_budget_alerts(EXERCICE).unwrap();
        let graded: Vec<(&str, AlertLevel)> =
            alerts.iter().map(|a| (a.code.as_str(), a.niveau)).collect();
        assert_eq!(
            graded,
            vec![
                ("6403", AlertLevel::Blocking),
                ("6402", AlertLevel::Critical),
                ("6401", AlertLevel::Warning),
            ]
        );
        assert_eq!(alerts[0].taux_consommation, dec!(100));
        assert_eq!(alerts[2].seuil_pct, dec!(80));
        assert_eq!(alerts[1].disponible_brut, dec!(40));

        let summary = env.state.budget_api.get_budget_summary(EXERCICE).unwrap();
        assert_eq!(summary.nb_lignes, 5);
        assert_eq!(summary.nb_lignes_alerte, 3);
    }

    #[test]
    fn test_alert_threshold_comes_from_config() {
        let env = TestEnv::new();
        let line = env.seed_line("6411", dec!(1000));
        env.commit(&line.budget_line_id, dec!(600));
        assert!(env.state.budget_api.list_budget_alerts(EXERCICE).unwrap().is_empty());

        env.state
            .config_manager
            .set_global_config_value(config_keys::ALERT_THRESHOLD_PCT, "60")
            .unwrap();
        let reopened = AppState::new(env.db_path.clone()).unwrap();
        assert_eq!(reopened.policy.alert_threshold_pct, dec!(60));

        let alerts = reopened.budget_api.list_budget_alerts(EXERCICE).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].niveau, AlertLevel::Warning);
        assert_eq!(alerts[0].taux_consommation, dec!(60));
    }
}
