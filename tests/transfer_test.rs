// ==========================================
// 调拨 - 创建 / 执行 / 取消
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod transfer_test {
    use super::test_helpers::*;
    use budget_commitment::api::ApiError;
    use budget_commitment::domain::transfer::NewCreditTransfer;
    use budget_commitment::domain::types::{MovementType, TransferStatus};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn transfer(from: Option<&str>, to: &str, amount: Decimal) -> NewCreditTransfer {
        NewCreditTransfer {
            exercice: EXERCICE,
            from_budget_line_id: from.map(str::to_string),
            to_budget_line_id: to.to_string(),
            amount,
            motif: "Reequilibrage".to_string(),
        }
    }

    #[test]
    fn test_execute_moves_allocation_once() {
        let env = TestEnv::new();
        let a = env.seed_line("6401", dec!(1000));
        let b = env.seed_line("6402", dec!(200));
        let api = &env.state.transfer_api;

        let created = api
            .create_transfer(
                &transfer(Some(a.budget_line_id.as_str()), &b.budget_line_id, dec!(300)),
                &agent(),
            )
            .unwrap();
        assert_eq!(created.status, TransferStatus::Pending);
        assert_eq!(created.code, "VIR-2026-0001");

        // 待执行的调拨不计入
        let pending = env
            .state
            .commitment_api
            .get_availability(&b.budget_line_id, EXERCICE)
            .unwrap();
        assert_eq!(pending.virements_recus, dec!(0));

        // 权限关口
        assert!(matches!(
            api.execute_transfer(&created.transfer_id, &agent()),
            Err(ApiError::PermissionDenied(_))
        ));

        let executed = api.execute_transfer(&created.transfer_id, &treasurer()).unwrap();
        assert_eq!(executed.status, TransferStatus::Executed);
        assert_eq!(executed.executed_by.as_deref(), Some("tresorier"));

        let from = env
            .state
            .commitment_api
            .get_availability(&a.budget_line_id, EXERCICE)
            .unwrap();
        let to = env
            .state
            .commitment_api
            .get_availability(&b.budget_line_id, EXERCICE)
            .unwrap();
        assert_eq!(from.virements_emis, dec!(300));
        assert_eq!(from.dotation_actuelle, dec!(700));
        assert_eq!(to.virements_recus, dec!(300));
        assert_eq!(to.dotation_actuelle, dec!(500));

        // 第二次执行被拒,合计不变
        assert!(api.execute_transfer(&created.transfer_id, &treasurer()).is_err());
        assert_eq!(
            env.state
                .commitment_api
                .get_availability(&b.budget_line_id, EXERCICE)
                .unwrap()
                .dotation_actuelle,
            dec!(500)
        );

        let movements = env.state.budget_api.list_movements(&a.budget_line_id).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::TransferOut);
        assert_eq!(movements[0].delta, dec!(-300));
    }

    #[test]
    fn test_source_must_cover_amount() {
        let env = TestEnv::new();
        let a = env.seed_line("6411", dec!(1000));
        let b = env.seed_line("6412", dec!(0));

        // 调出方预留 600 后剩余 400
        env.state
            .commitment_api
            .submit_new(&single(&a.budget_line_id, dec!(600)), &agent())
            .unwrap();

        let created = env
            .state
            .transfer_api
            .create_transfer(
                &transfer(Some(a.budget_line_id.as_str()), &b.budget_line_id, dec!(500)),
                &agent(),
            )
            .unwrap();
        match env.state.transfer_api.execute_transfer(&created.transfer_id, &treasurer()) {
            Err(ApiError::InsufficientFunds { deficit, shortfalls }) => {
                assert_eq!(deficit, dec!(100));
                assert_eq!(shortfalls[0].disponible_net, dec!(400));
            }
            other => panic!("expected InsufficientFunds, got {:?}", other),
        }

        // 仍为待执行,金额未变动
        let still = env.state.transfer_api.get_transfer(&created.transfer_id).unwrap();
        assert_eq!(still.status, TransferStatus::Pending);
        assert_eq!(
            env.state
                .commitment_api
                .get_availability(&b.budget_line_id, EXERCICE)
                .unwrap()
                .dotation_actuelle,
            dec!(0)
        );
    }

    #[test]
    fn test_external_top_up_has_no_source_check() {
        let env = TestEnv::new();
        let line = env.seed_line("6421", dec!(0));
        env.top_up(&line.budget_line_id, dec!(1500));

        let b = env
            .state
            .commitment_api
            .get_availability(&line.budget_line_id, EXERCICE)
            .unwrap();
        assert_eq!(b.dotation_actuelle, dec!(1500));
        assert_eq!(b.disponible_net, dec!(1500));
    }

    #[test]
    fn test_create_validation() {
        let env = TestEnv::new();
        let a = env.seed_line("6431", dec!(1000));
        let api = &env.state.transfer_api;

        let same_line = transfer(Some(a.budget_line_id.as_str()), &a.budget_line_id, dec!(10));
        assert!(matches!(
            api.create_transfer(&same_line, &agent()),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.create_transfer(&transfer(None, &a.budget_line_id, dec!(0)), &agent()),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.create_transfer(&transfer(None, "missing", dec!(10)), &agent()),
            Err(ApiError::NotFound(_))
        ));

        let mut no_motif = transfer(None, &a.budget_line_id, dec!(10));
        no_motif.motif = "  ".to_string();
        assert!(matches!(
            api.create_transfer(&no_motif, &agent()),
            Err(ApiError::MissingField(_))
        ));

        let mut other_year = transfer(None, &a.budget_line_id, dec!(10));
        other_year.exercice = EXERCICE + 1;
        assert!(matches!(
            api.create_transfer(&other_year, &agent()),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cancel_pending_only() {
        let env = TestEnv::new();
        let a = env.seed_line("6441", dec!(1000));
        let b = env.seed_line("6442", dec!(0));
        let api = &env.state.transfer_api;
        let a_to_b = transfer(Some(a.budget_line_id.as_str()), &b.budget_line_id, dec!(100));

        let first = api
            .create_transfer(&a_to_b, &agent())
            .unwrap();
        assert!(matches!(
            api.cancel_transfer(&first.transfer_id, "", &agent()),
            Err(ApiError::MissingField(_))
        ));
        let cancelled = api
            .cancel_transfer(&first.transfer_id, "Saisie erronee", &agent())
            .unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("Saisie erronee"));

        // 已取消的不能执行
        assert!(api.execute_transfer(&first.transfer_id, &treasurer()).is_err());

        // 已执行的不能取消
        let second = api
            .create_transfer(&a_to_b, &agent())
            .unwrap();
        assert_eq!(second.code, "VIR-2026-0002");
        api.execute_transfer(&second.transfer_id, &treasurer()).unwrap();
        assert!(matches!(
            api.cancel_transfer(&second.transfer_id, "Trop tard", &agent()),
            Err(ApiError::InvalidStateTransition { .. })
        ));

        let listed = api.list_transfers(EXERCICE, None).unwrap();
        assert_eq!(listed.len(), 2);
        let executed = api
            .list_transfers(EXERCICE, Some(TransferStatus::Executed))
            .unwrap();
        assert_eq!(executed.len(), 1);
        assert_eq!(api.list_transfers_by_line(&b.budget_line_id).unwrap().len(), 2);
    }
}
