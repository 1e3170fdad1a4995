use crate::bpf::primitive::{Condition, Operand};

use super::{
    instruction::Instruction,
    primitive::{AddressingMode, ReturnValue, Size},
};

#[derive(Debug, thiserror::Error, displaydoc::Display, PartialEq, Eq)]
pub enum StatementError {
    /// body contained {0} instructions, which is more than the maximum of 255
    TooLargeBody(usize),
    /// condition contained {terms} instructions, which is more than the maximum of {max} allowed with this body
    TooLargeCondition { terms: usize, max: usize },
    /// condition cannot be empty
    EmptyCondition,
    /// the fallback body must end with a return, otherwise it would run into the matched body
    FallThroughFallback,
}

/// Return the immediate value (instruction data)
pub fn return_immediate(data: u32) -> Instruction {
    Instruction::Return {
        return_value: ReturnValue::Immediate,
        data,
    }
}

/// Load the data from the arguments provided to the BPF program into accumulator register
pub fn load_input(size: Size, offset: u32) -> Instruction {
    Instruction::LoadAccumulator {
        addressing_mode: AddressingMode::ProgramInput,
        size,
        data: offset,
    }
}

pub struct IfCondition {
    pub condition: Condition,
    pub operand: Operand,
    pub data: u32,
}

impl IfCondition {
    pub fn eq(data: u32) -> Self {
        Self {
            condition: Condition::Equal,
            operand: Operand::Immediate,
            data,
        }
    }

    pub fn bit_set(mask: u32) -> Self {
        Self {
            condition: Condition::BitSet,
            operand: Operand::Immediate,
            data: mask,
        }
    }
}

fn body_len(body: &[Instruction]) -> Result<u8, StatementError> {
    u8::try_from(body.len()).map_err(|_| StatementError::TooLargeBody(body.len()))
}

pub fn if_statement(
    IfCondition {
        condition,
        operand,
        data,
    }: IfCondition,
    body: Vec<Instruction>,
) -> Result<Vec<Instruction>, StatementError> {
    let mut ixs = vec![Instruction::Jump {
        condition,
        operand,
        data,
        // true => execute the body
        jump_offset_if_true: 0,
        // false => skip the body
        jump_offset_if_false: body_len(&body)?,
    }];
    ixs.extend(body);
    Ok(ixs)
}

pub fn if_not_statement(
    IfCondition {
        condition,
        operand,
        data,
    }: IfCondition,
    body: Vec<Instruction>,
) -> Result<Vec<Instruction>, StatementError> {
    let mut ixs = vec![Instruction::Jump {
        condition,
        operand,
        data,
        // true => skip the body
        jump_offset_if_true: body_len(&body)?,
        // false => execute the body
        jump_offset_if_false: 0,
    }];
    ixs.extend(body);
    Ok(ixs)
}

/// `if (a || b || ...) { matched } else { fallback }`, with the fallback laid out first
///
/// Layout: the n conditions, then `fallback`, then `matched`.
/// If the i-th condition (0-based) is true, we jump over the (n - 1 - i) remaining conditions and the fallback body;
/// if it is false, we fall through to the next condition, and after the last one into the fallback.
/// Since the matched body follows the fallback, the fallback has to end with a return.
pub fn if_any_else_statement(
    terms_any: Vec<IfCondition>,
    matched: Vec<Instruction>,
    fallback: Vec<Instruction>,
) -> Result<Vec<Instruction>, StatementError> {
    if terms_any.is_empty() {
        return Err(StatementError::EmptyCondition);
    }

    if !matches!(fallback.last(), Some(Instruction::Return { .. })) {
        return Err(StatementError::FallThroughFallback);
    }

    let fallback_len = body_len(&fallback)?;

    let terms_count = terms_any.len();
    let mut ixs = vec![];
    for (
        i,
        IfCondition {
            condition,
            operand,
            data,
        },
    ) in terms_any.into_iter().enumerate()
    {
        let conditions_remaining = terms_count - 1 - i;
        let jump_offset_if_true = u8::try_from(conditions_remaining + usize::from(fallback_len))
            .map_err(|_| StatementError::TooLargeCondition {
                terms: terms_count,
                // the first condition jumps over all the others and the fallback
                max: usize::from(u8::MAX - fallback_len) + 1,
            })?;
        ixs.push(Instruction::Jump {
            condition,
            operand,
            data,
            jump_offset_if_true,
            jump_offset_if_false: 0,
        });
    }
    ixs.extend(fallback);
    ixs.extend(matched);
    Ok(ixs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jump_offsets(ixs: &[Instruction]) -> Vec<(u8, u8)> {
        ixs.iter().map(Instruction::jump_offsets).collect()
    }

    #[test]
    fn if_skips_body_when_false() {
        let ixs = if_statement(IfCondition::bit_set(0x4000_0000), vec![return_immediate(1)])
            .unwrap();
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[0].jump_offsets(), (0, 1));
    }

    #[test]
    fn if_not_skips_body_when_true() {
        let ixs = if_not_statement(
            IfCondition::eq(16),
            vec![return_immediate(1), return_immediate(2)],
        )
        .unwrap();
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].jump_offsets(), (2, 0));
    }

    #[test]
    fn too_large_body() {
        let body = vec![return_immediate(0); 256];
        assert_eq!(
            if_statement(IfCondition::eq(0), body).unwrap_err(),
            StatementError::TooLargeBody(256)
        );
    }

    #[test]
    fn any_else_jumps_past_fallback() {
        let ixs = if_any_else_statement(
            vec![IfCondition::eq(0x5412), IfCondition::eq(0x541c)],
            vec![return_immediate(2)],
            vec![return_immediate(1)],
        )
        .unwrap();
        assert_eq!(jump_offsets(&ixs), vec![(2, 0), (1, 0), (0, 0), (0, 0)]);
        assert_eq!(ixs[2].data(), 1);
        assert_eq!(ixs[3].data(), 2);
    }

    #[test]
    fn any_else_errors() {
        assert_eq!(
            if_any_else_statement(vec![], vec![return_immediate(1)], vec![return_immediate(2)])
                .unwrap_err(),
            StatementError::EmptyCondition
        );
        assert_eq!(
            if_any_else_statement(
                vec![IfCondition::eq(1)],
                vec![return_immediate(1)],
                vec![load_input(Size::Word, 0)]
            )
            .unwrap_err(),
            StatementError::FallThroughFallback
        );
        assert_eq!(
            if_any_else_statement(
                (0..300).map(IfCondition::eq).collect(),
                vec![return_immediate(1)],
                vec![return_immediate(2)]
            )
            .unwrap_err(),
            StatementError::TooLargeCondition {
                terms: 300,
                max: 255
            }
        );
    }

    #[test]
    fn condition_limit_depends_on_fallback() {
        let any_else = |n: u32, fallback_len: usize| {
            if_any_else_statement(
                (0..n).map(IfCondition::eq).collect(),
                vec![return_immediate(1)],
                vec![return_immediate(2); fallback_len],
            )
        };

        assert_eq!(any_else(255, 1).unwrap()[0].jump_offsets(), (255, 0));
        assert_eq!(
            any_else(256, 1).unwrap_err(),
            StatementError::TooLargeCondition {
                terms: 256,
                max: 255
            }
        );

        assert!(any_else(240, 16).is_ok());
        let err = any_else(241, 16).unwrap_err();
        assert_eq!(
            err,
            StatementError::TooLargeCondition {
                terms: 241,
                max: 240
            }
        );
        assert!(err.to_string().contains("maximum of 240"));
    }
}
