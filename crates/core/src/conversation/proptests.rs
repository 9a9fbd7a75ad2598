//! Property-based tests for the conversation state machine.

use proptest::prelude::*;

use super::*;

#[derive(Clone, Debug)]
enum Op {
    Submit(String),
    Success(String),
    Failure(String),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[ a-z]{0,8}".prop_map(Op::Submit),
        1 => "[a-z]{1,8}".prop_map(Op::Success),
        1 => "[a-z]{1,8}".prop_map(Op::Failure),
    ]
}

proptest! {
    #[test]
    fn user_turns_never_exceed_max(
        max in 0usize..6,
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut conv = Conversation::new(max);
        for op in ops {
            match op {
                Op::Submit(text) => { conv.submit(&text).ok(); }
                Op::Success(text) => { conv.on_reply_success(text).ok(); }
                Op::Failure(text) => { conv.on_reply_failure(text).ok(); }
            }
            prop_assert!(conv.user_turn_count() <= max);
        }
    }

    #[test]
    fn rejected_submit_changes_nothing(
        max in 0usize..4,
        ops in prop::collection::vec(arb_op(), 0..30),
    ) {
        let mut conv = Conversation::new(max);
        for op in ops {
            match op {
                Op::Submit(text) => {
                    let turns = conv.turns().to_vec();
                    let stage = conv.stage();
                    match conv.submit(&text) {
                        Ok(req) => {
                            prop_assert_eq!(stage, Stage::Idle);
                            let len = conv.turns().len();
                            prop_assert_eq!(len, turns.len() + 1);
                            prop_assert_eq!(conv.stage(), Stage::AwaitingReply);
                            let last =
                                req.messages.last().map(ModelMessage::text);
                            prop_assert_eq!(last, Some(text.as_str()));
                        }
                        Err(_) => {
                            prop_assert_eq!(conv.turns(), turns.as_slice());
                            prop_assert_eq!(conv.stage(), stage);
                        }
                    }
                }
                Op::Success(text) => {
                    let was_awaiting = conv.is_awaiting_reply();
                    let recorded = conv.on_reply_success(text).is_ok();
                    prop_assert_eq!(recorded, was_awaiting);
                    prop_assert_eq!(conv.stage(), Stage::Idle);
                }
                Op::Failure(text) => {
                    let was_awaiting = conv.is_awaiting_reply();
                    let recorded = conv.on_reply_failure(text).is_ok();
                    prop_assert_eq!(recorded, was_awaiting);
                    prop_assert_eq!(conv.stage(), Stage::Idle);
                }
            }
        }
    }
}
