//! Borrower and loan tables.

use uuid::Uuid;

use super::{BorrowerRow, LoanRow, Store, StoreError, StoreResult};

impl Store {
    pub fn insert_borrower(&mut self, row: BorrowerRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.groups.contains_key(&row.group_id) {
            return Err(StoreError::ForeignKey { table: "borrowers", column: "group_id" });
        }
        if self.borrowers.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation { table: "borrowers", column: "id" });
        }
        self.borrowers.insert(row.id, row);
        Ok(())
    }

    pub fn borrower(&self, id: Uuid) -> StoreResult<Option<&BorrowerRow>> {
        self.ensure_open()?;
        Ok(self.borrowers.get(&id))
    }

    pub fn select_borrowers<P: Fn(&BorrowerRow) -> bool>(&self, pred: P) -> StoreResult<Vec<BorrowerRow>> {
        self.ensure_open()?;
        Ok(self.borrowers.values().filter(|b| pred(b)).cloned().collect())
    }

    pub fn update_borrowers<P, F>(&mut self, pred: P, mut apply: F) -> StoreResult<usize>
    where
        P: Fn(&BorrowerRow) -> bool,
        F: FnMut(&mut BorrowerRow),
    {
        self.ensure_open()?;
        let mut n = 0;
        for row in self.borrowers.values_mut().filter(|b| pred(b)) {
            apply(row);
            n += 1;
        }
        Ok(n)
    }

    /// Delete matching borrowers; their loans go with them.
    pub fn delete_borrowers<P: Fn(&BorrowerRow) -> bool>(&mut self, pred: P) -> StoreResult<usize> {
        self.ensure_open()?;
        let doomed: Vec<Uuid> = self.borrowers.values().filter(|b| pred(b)).map(|b| b.id).collect();
        for id in &doomed {
            self.borrowers.remove(id);
        }
        self.loans.retain(|_, l| !doomed.contains(&l.borrower_id));
        Ok(doomed.len())
    }

    pub fn insert_loan(&mut self, row: LoanRow) -> StoreResult<()> {
        self.ensure_open()?;
        if !self.groups.contains_key(&row.group_id) {
            return Err(StoreError::ForeignKey { table: "loans", column: "group_id" });
        }
        if !self.items.contains_key(&row.item_id) {
            return Err(StoreError::ForeignKey { table: "loans", column: "item_id" });
        }
        if !self.borrowers.contains_key(&row.borrower_id) {
            return Err(StoreError::ForeignKey { table: "loans", column: "borrower_id" });
        }
        if row.quantity <= 0 {
            return Err(StoreError::Check { table: "loans", column: "quantity" });
        }
        if self.loans.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation { table: "loans", column: "id" });
        }
        self.loans.insert(row.id, row);
        Ok(())
    }

    pub fn loan(&self, id: Uuid) -> StoreResult<Option<&LoanRow>> {
        self.ensure_open()?;
        Ok(self.loans.get(&id))
    }

    pub fn select_loans<P: Fn(&LoanRow) -> bool>(&self, pred: P) -> StoreResult<Vec<LoanRow>> {
        self.ensure_open()?;
        Ok(self.loans.values().filter(|l| pred(l)).cloned().collect())
    }

    pub fn count_loans<P: Fn(&LoanRow) -> bool>(&self, pred: P) -> StoreResult<usize> {
        self.ensure_open()?;
        Ok(self.loans.values().filter(|l| pred(l)).count())
    }

    pub fn update_loans<P, F>(&mut self, pred: P, mut apply: F) -> StoreResult<usize>
    where
        P: Fn(&LoanRow) -> bool,
        F: FnMut(&mut LoanRow),
    {
        self.ensure_open()?;
        let mut n = 0;
        for row in self.loans.values_mut().filter(|l| pred(l)) {
            apply(row);
            n += 1;
        }
        Ok(n)
    }

    pub fn delete_loans<P: Fn(&LoanRow) -> bool>(&mut self, pred: P) -> StoreResult<usize> {
        self.ensure_open()?;
        let before = self.loans.len();
        self.loans.retain(|_, l| !pred(l));
        Ok(before - self.loans.len())
    }
}
