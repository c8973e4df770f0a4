//! Transfer construction: UTXO selection, change, signing.
//!
//! The wallet fetches its spendable outputs from a node
//! (`GET /unspent/{address}`, which already excludes outputs consumed by
//! pending pool transactions), selects enough of them to cover the
//! requested amount, sends any excess back to itself as change, and
//! signs every input over the transaction id.

use ducat_core::types::{Transaction, TxIn, TxOut};
use ducat_core::utxo::Utxo;

use crate::error::WalletError;
use crate::keys::WalletKey;

/// Build a signed transfer of `amount` to `recipient`.
///
/// `spendable` is consumed greedily in the given order; outputs not
/// owned by the key's address are skipped. Value is conserved exactly:
/// selected inputs equal the recipient output plus change (omitted when
/// zero).
pub fn build_transfer(
    spendable: &[Utxo],
    key: &WalletKey,
    recipient: &str,
    amount: u64,
) -> Result<Transaction, WalletError> {
    if amount == 0 {
        return Err(WalletError::ZeroAmount);
    }

    let sender = key.address();
    let mut selected: Vec<&Utxo> = Vec::new();
    let mut total: u64 = 0;
    for utxo in spendable.iter().filter(|u| u.address == sender) {
        if total >= amount {
            break;
        }
        total = total
            .checked_add(utxo.amount)
            .ok_or(WalletError::ValueOverflow)?;
        selected.push(utxo);
    }
    if total < amount {
        return Err(WalletError::InsufficientFunds { have: total, need: amount });
    }

    let mut outs = vec![TxOut { address: recipient.to_string(), amount }];
    let change = total - amount;
    if change > 0 {
        outs.push(TxOut { address: sender, amount: change });
    }

    let ins = selected
        .into_iter()
        .map(|utxo| TxIn {
            prev_tx_id: utxo.tx_id.clone(),
            prev_out_index: utxo.out_index,
            signature: String::new(),
            public_key: String::new(),
        })
        .collect();

    let mut tx = Transaction::assemble(ins, outs);
    let signature = key.sign_tx_id(&tx.id)?;
    let pem = key.public_key_pem();
    for txin in &mut tx.ins {
        txin.signature = signature.clone();
        txin.public_key = pem.clone();
    }
    Ok(tx)
}
