use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

use crate::error::GroupError;
use crate::execution::solana::{expense_address, group_address};
use crate::payment::lamports_to_decimal;

pub const MAX_GROUP_NAME_LEN: usize = 50;
pub const MAX_MEMBERS: usize = 20;
pub const MAX_DESCRIPTION_LEN: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub authority: Pubkey,
    pub members: Vec<Pubkey>,
    /// Program-derived account holding the group on-chain
    pub address: Pubkey,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(
        name: impl Into<String>,
        authority: Pubkey,
        members: Vec<Pubkey>,
        program_id: &Pubkey,
    ) -> Result<Self, GroupError> {
        let name = name.into();
        // Byte length, as the program measures it
        if name.is_empty() || name.len() > MAX_GROUP_NAME_LEN {
            return Err(GroupError::InvalidGroupName);
        }
        if members.is_empty() || members.len() > MAX_MEMBERS {
            return Err(GroupError::InvalidMemberCount);
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(GroupError::MemberAlreadyExists);
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            address: group_address(&authority, &name, program_id),
            name,
            authority,
            members,
            created_at: Utc::now(),
        })
    }

    pub fn add_member(&mut self, caller: &Pubkey, member: Pubkey) -> Result<(), GroupError> {
        if self.authority != *caller {
            return Err(GroupError::Unauthorized);
        }
        if self.members.len() >= MAX_MEMBERS {
            return Err(GroupError::GroupFull);
        }
        if self.members.contains(&member) {
            return Err(GroupError::MemberAlreadyExists);
        }

        self.members.push(member);
        Ok(())
    }

    /// Only the member at `index` may sign for that member's share
    pub fn ensure_member(&self, index: u8, signer: &Pubkey) -> Result<(), GroupError> {
        let member = self
            .members
            .get(index as usize)
            .ok_or(GroupError::InvalidMemberIndex)?;
        if member != signer {
            return Err(GroupError::UnauthorizedMember);
        }
        Ok(())
    }
}

/// How an expense total is divided between members
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SplitMode {
    Equal,
    Custom(Vec<u64>),
}

impl SplitMode {
    /// Per-member lamports; an equal split hands the remainder to the first members
    pub fn split(&self, total: u64, member_count: usize) -> Result<Vec<u64>, GroupError> {
        if total == 0 {
            return Err(GroupError::InvalidAmount);
        }
        if member_count == 0 {
            return Err(GroupError::InvalidMemberCount);
        }

        match self {
            SplitMode::Equal => {
                let count = member_count as u64;
                let base = total / count;
                let remainder = (total % count) as usize;
                Ok((0..member_count)
                    .map(|i| if i < remainder { base + 1 } else { base })
                    .collect())
            }
            SplitMode::Custom(amounts) => {
                if amounts.len() != member_count {
                    return Err(GroupError::MismatchedSplitCount);
                }
                let sum = amounts
                    .iter()
                    .try_fold(0u64, |acc, amount| acc.checked_add(*amount));
                if sum != Some(total) {
                    return Err(GroupError::InvalidSplitSum);
                }
                Ok(amounts.clone())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub description: String,
    /// Member who fronted the expense; shares are paid to this address
    pub payer: Pubkey,
    pub total_amount: u64,
    pub split_amounts: Vec<u64>,
    pub paid_status: Vec<bool>,
    pub settled: bool,
    pub address: Pubkey,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        group: &Group,
        payer: Pubkey,
        description: impl Into<String>,
        total_amount: u64,
        mode: &SplitMode,
        created_at: DateTime<Utc>,
        program_id: &Pubkey,
    ) -> Result<Self, GroupError> {
        let description = description.into();
        if description.is_empty() || description.len() > MAX_DESCRIPTION_LEN {
            return Err(GroupError::InvalidDescription);
        }

        let split_amounts = mode.split(total_amount, group.members.len())?;

        Ok(Self {
            id: Uuid::new_v4(),
            group_id: group.id,
            group_name: group.name.clone(),
            description,
            payer,
            total_amount,
            paid_status: vec![false; split_amounts.len()],
            split_amounts,
            settled: false,
            address: expense_address(&group.address, &payer, created_at.timestamp(), program_id),
            created_at,
        })
    }

    pub fn share(&self, member_index: u8) -> Result<u64, GroupError> {
        self.split_amounts
            .get(member_index as usize)
            .copied()
            .ok_or(GroupError::InvalidMemberIndex)
    }

    /// Fails when the index is out of range or the share is already paid
    pub fn ensure_payable(&self, member_index: u8) -> Result<u64, GroupError> {
        let share = self.share(member_index)?;
        if self.paid_status[member_index as usize] {
            return Err(GroupError::AlreadyPaid);
        }
        Ok(share)
    }

    /// Settles the expense once every share is paid
    pub fn mark_paid(&mut self, member_index: u8) -> Result<(), GroupError> {
        self.ensure_payable(member_index)?;
        self.paid_status[member_index as usize] = true;
        self.settled = self.paid_status.iter().all(|paid| *paid);
        Ok(())
    }

    pub fn outstanding(&self) -> u64 {
        self.split_amounts
            .iter()
            .zip(&self.paid_status)
            .filter(|(_, paid)| !**paid)
            .map(|(amount, _)| *amount)
            .sum()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFilter {
    #[default]
    All,
    Pending,
    Settled,
}

impl PaymentFilter {
    pub fn matches(&self, expense: &Expense) -> bool {
        match self {
            PaymentFilter::All => true,
            PaymentFilter::Pending => !expense.settled,
            PaymentFilter::Settled => expense.settled,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub total_groups: usize,
    pub pending_payments: usize,
    pub settled_payments: usize,
}

/// API view of a group
#[derive(Clone, Debug, Serialize)]
pub struct GroupView {
    pub id: Uuid,
    pub name: String,
    pub authority: String,
    pub members: Vec<String>,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Group> for GroupView {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            authority: group.authority.to_string(),
            members: group.members.iter().map(|m| m.to_string()).collect(),
            address: group.address.to_string(),
            created_at: group.created_at,
        }
    }
}

/// API view of an expense, amounts in SOL
#[derive(Clone, Debug, Serialize)]
pub struct ExpenseView {
    pub id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub description: String,
    pub payer: String,
    pub amount: Decimal,
    pub split_amounts: Vec<Decimal>,
    pub paid_status: Vec<bool>,
    pub outstanding: Decimal,
    pub settled: bool,
    pub address: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Expense> for ExpenseView {
    fn from(expense: &Expense) -> Self {
        Self {
            id: expense.id,
            group_id: expense.group_id,
            group_name: expense.group_name.clone(),
            description: expense.description.clone(),
            payer: expense.payer.to_string(),
            amount: lamports_to_decimal(expense.total_amount),
            split_amounts: expense
                .split_amounts
                .iter()
                .map(|amount| lamports_to_decimal(*amount))
                .collect(),
            paid_status: expense.paid_status.clone(),
            outstanding: lamports_to_decimal(expense.outstanding()),
            settled: expense.settled,
            address: expense.address.to_string(),
            timestamp: expense.created_at,
        }
    }
}
