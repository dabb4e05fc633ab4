use async_trait::async_trait;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::error::SettlementError;
use crate::settlement::{SettlementRequest, SettlementResult, SettlementTrigger};
use crate::wallet::WalletProvider;

pub const PAY_EXPENSE: &str = "pay_expense";

#[derive(BorshSerialize)]
struct PayExpenseArgs {
    member_index: u8,
}

/// First 8 bytes of `sha256("global:<name>")`
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("global:{}", name).as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// Build `pay_expense(member_index)` with the member as signer
pub fn pay_expense_instruction(
    program_id: &Pubkey,
    member: &Pubkey,
    request: &SettlementRequest,
) -> Result<Instruction, SettlementError> {
    let mut data = instruction_discriminator(PAY_EXPENSE).to_vec();
    borsh::to_writer(
        &mut data,
        &PayExpenseArgs {
            member_index: request.member_index,
        },
    )
    .map_err(|e| SettlementError::RemoteCallFailed(format!("Failed to encode arguments: {}", e)))?;

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(request.expense, false),
            AccountMeta::new_readonly(request.group, false),
            AccountMeta::new(*member, true),
            AccountMeta::new(request.payer, false),
            AccountMeta::new_readonly(solana_system_interface::program::ID, false),
        ],
        data,
    })
}

/// Settles through the split-bill program, signed by the connected wallet
pub struct AnchorSettlement {
    wallet: Arc<dyn WalletProvider>,
    program_id: Pubkey,
}

impl AnchorSettlement {
    pub fn new(wallet: Arc<dyn WalletProvider>, program_id: Pubkey) -> Self {
        Self { wallet, program_id }
    }

    async fn submit(&self, request: &SettlementRequest) -> Result<String, SettlementError> {
        let member = self
            .wallet
            .public_key()
            .ok_or(SettlementError::WalletNotConnected)?;

        let instruction = pay_expense_instruction(&self.program_id, &member, request)?;
        let signature = self.wallet.submit(instruction).await?;

        Ok(signature.to_string())
    }
}

#[async_trait]
impl SettlementTrigger for AnchorSettlement {
    #[instrument(skip(self, request), fields(member_index = request.member_index, expense = %request.expense))]
    async fn settle(&self, request: &SettlementRequest) -> SettlementResult {
        info!("🔄 Settling share of member {} on expense {}", request.member_index, request.expense);

        let result = self.submit(request).await;
        match &result {
            Ok(signature) => info!("✅ Share settled on-chain: {}", signature),
            Err(e) => error!("❌ Settlement failed: {}", e),
        }

        result.into()
    }
}
