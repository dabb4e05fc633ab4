use chrono::{Duration, Utc};
use parking_lot::RwLock;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GroupError;
use crate::groups::models::{Expense, Group, GroupStats, PaymentFilter, SplitMode};

#[derive(Default)]
struct Store {
    groups: HashMap<Uuid, Group>,
    expenses: HashMap<Uuid, Expense>,
}

/// In-memory groups and expenses; nothing survives a restart
pub struct GroupRepository {
    program_id: Pubkey,
    store: RwLock<Store>,
}

impl GroupRepository {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            store: RwLock::new(Store::default()),
        }
    }

    pub fn create_group(
        &self,
        name: &str,
        authority: Pubkey,
        members: Vec<Pubkey>,
    ) -> Result<Group, GroupError> {
        let group = Group::new(name, authority, members, &self.program_id)?;
        info!("✅ Group '{}' created with {} members", group.name, group.members.len());

        self.store.write().groups.insert(group.id, group.clone());
        Ok(group)
    }

    /// Oldest first
    pub fn list_groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = self.store.read().groups.values().cloned().collect();
        groups.sort_by_key(|group| group.created_at);
        groups
    }

    pub fn get_group(&self, id: Uuid) -> Result<Group, GroupError> {
        self.store
            .read()
            .groups
            .get(&id)
            .cloned()
            .ok_or(GroupError::GroupNotFound(id))
    }

    pub fn add_member(
        &self,
        group_id: Uuid,
        caller: &Pubkey,
        member: Pubkey,
    ) -> Result<Group, GroupError> {
        let mut store = self.store.write();
        let group = store
            .groups
            .get_mut(&group_id)
            .ok_or(GroupError::GroupNotFound(group_id))?;

        group.add_member(caller, member)?;
        debug!("Member {} added to group '{}'", member, group.name);
        Ok(group.clone())
    }

    pub fn create_expense(
        &self,
        group_id: Uuid,
        payer: Pubkey,
        description: &str,
        total_amount: u64,
        mode: &SplitMode,
    ) -> Result<Expense, GroupError> {
        let mut store = self.store.write();
        let group = store
            .groups
            .get(&group_id)
            .ok_or(GroupError::GroupNotFound(group_id))?;

        let expense = Expense::new(
            group,
            payer,
            description,
            total_amount,
            mode,
            Utc::now(),
            &self.program_id,
        )?;
        info!(
            "💸 Expense created: '{}' for {} lamports",
            expense.description, expense.total_amount
        );

        store.expenses.insert(expense.id, expense.clone());
        Ok(expense)
    }

    pub fn get_expense(&self, id: Uuid) -> Result<Expense, GroupError> {
        self.store
            .read()
            .expenses
            .get(&id)
            .cloned()
            .ok_or(GroupError::ExpenseNotFound(id))
    }

    /// Newest first
    pub fn list_payments(&self, group_id: Option<Uuid>, filter: PaymentFilter) -> Vec<Expense> {
        let mut payments: Vec<Expense> = self
            .store
            .read()
            .expenses
            .values()
            .filter(|expense| group_id.map_or(true, |id| expense.group_id == id))
            .filter(|expense| filter.matches(expense))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments
    }

    pub fn mark_paid(&self, expense_id: Uuid, member_index: u8) -> Result<Expense, GroupError> {
        let mut store = self.store.write();
        let expense = store
            .expenses
            .get_mut(&expense_id)
            .ok_or(GroupError::ExpenseNotFound(expense_id))?;

        expense.mark_paid(member_index)?;
        if expense.settled {
            info!("🎉 Expense '{}' fully settled", expense.description);
        }
        Ok(expense.clone())
    }

    pub fn stats(&self) -> GroupStats {
        let store = self.store.read();
        let settled = store.expenses.values().filter(|e| e.settled).count();

        GroupStats {
            total_groups: store.groups.len(),
            pending_payments: store.expenses.len() - settled,
            settled_payments: settled,
        }
    }

    /// Demo groups and expenses with `owner` as the first member of each group
    pub fn seed_demo(&self, owner: Pubkey) -> Result<(), GroupError> {
        let friend = || Keypair::new().pubkey();
        let trip = Group::new(
            "Weekend Trip",
            owner,
            vec![owner, friend(), friend()],
            &self.program_id,
        )?;
        let roommates = Group::new("Roommates", owner, vec![owner, friend()], &self.program_id)?;

        let now = Utc::now();
        let hotel = Expense::new(
            &trip,
            owner,
            "Hotel Booking",
            2_500_000_000,
            &SplitMode::Equal,
            now - Duration::days(2),
            &self.program_id,
        )?;
        let mut electricity = Expense::new(
            &roommates,
            owner,
            "Electricity Bill",
            750_000_000,
            &SplitMode::Equal,
            now - Duration::days(5),
            &self.program_id,
        )?;
        for index in 0..roommates.members.len() {
            electricity.mark_paid(index as u8)?;
        }
        let dinner = Expense::new(
            &trip,
            owner,
            "Dinner",
            1_200_000_000,
            &SplitMode::Equal,
            now - Duration::days(1),
            &self.program_id,
        )?;

        let mut store = self.store.write();
        for group in [trip, roommates] {
            store.groups.insert(group.id, group);
        }
        for expense in [hotel, electricity, dinner] {
            store.expenses.insert(expense.id, expense);
        }

        info!("🌱 Seeded demo data for {}", owner);
        Ok(())
    }
}
