use crate::domain::money::Balance;
use crate::domain::order::UserId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow {
    user: UserId,
    current: String,
    withdrawn: String,
}

/// Writes `user,current,withdrawn` rows, amounts in currency units.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances<I>(&mut self, balances: I) -> Result<()>
    where
        I: IntoIterator<Item = (UserId, Balance)>,
    {
        let mut wrote_any = false;
        for (user, balance) in balances {
            self.writer.serialize(BalanceRow {
                user,
                current: balance.current.to_string(),
                withdrawn: balance.withdrawn.to_string(),
            })?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record(["user", "current", "withdrawn"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
