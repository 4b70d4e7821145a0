//! Result materialization over forward-only row cursors.
//!
//! # Responsibility
//! - Decode the first row, all rows, or raw columns of a cursor.
//! - Replay a dispatch-time failure through the same retrieval calls.
//!
//! # Invariants
//! - The cursor is released exactly once, on every exit path.
//! - `read` never advances past the first row.
//! - `read_all` keeps cursor order and never returns partial results.

use super::{MapError, MapResult};
use rusqlite::types::FromSql;

/// One row of column values.
pub trait RowSource {
    /// Reads column `index` (zero-based) as `T`.
    ///
    /// # Errors
    /// - [`MapError::Decode`] when the value is missing or has another type.
    fn column<T: FromSql>(&self, index: usize) -> MapResult<T>;
}

impl RowSource for rusqlite::Row<'_> {
    fn column<T: FromSql>(&self, index: usize) -> MapResult<T> {
        self.get(index)
            .map_err(|err| MapError::Decode(format!("column {index}: {err}")))
    }
}

/// Forward-only cursor supplied by the driver.
pub trait RowCursor {
    type Row: RowSource;

    /// Moves to the next row; `None` once the cursor is exhausted.
    fn advance(&mut self) -> MapResult<Option<&Self::Row>>;

    /// Frees driver resources. Called once by [`Scanner`].
    fn release(&mut self);
}

/// Per-entity decoding of one row.
///
/// Returning [`MapError::NoRows`] signals "nothing decoded", which read
/// operations treat as an empty result rather than a failure.
pub trait DecodeRow: Sized {
    /// # Errors
    /// - [`MapError::Decode`] when the row does not describe a valid entity.
    fn decode_row<R: RowSource>(row: &R) -> MapResult<Self>;
}

/// Caller-owned destinations filled from the columns of one row.
pub trait ScanTarget {
    /// # Errors
    /// - [`MapError::Decode`] when a column does not fit its destination.
    fn scan_from<R: RowSource>(self, row: &R) -> MapResult<()>;
}

macro_rules! impl_scan_target {
    ($($index:tt => $ty:ident $dest:ident),+) => {
        impl<$($ty: FromSql),+> ScanTarget for ($(&mut $ty,)+) {
            fn scan_from<R: RowSource>(self, row: &R) -> MapResult<()> {
                let ($($dest,)+) = self;
                $(*$dest = row.column($index)?;)+
                Ok(())
            }
        }
    };
}

impl_scan_target!(0 => A a);
impl_scan_target!(0 => A a, 1 => B b);
impl_scan_target!(0 => A a, 1 => B b, 2 => C c);
impl_scan_target!(0 => A a, 1 => B b, 2 => C c, 3 => D d);

struct CursorGuard<C: RowCursor> {
    cursor: C,
}

impl<C: RowCursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        self.cursor.release();
    }
}

/// Retrieval front-end over a cursor or a captured dispatch error.
///
/// Every retrieval consumes the scanner, so one cursor feeds one call.
pub struct Scanner<C: RowCursor> {
    state: ScannerState<C>,
}

enum ScannerState<C: RowCursor> {
    Rows(CursorGuard<C>),
    Failed(MapError),
}

impl<C: RowCursor> Scanner<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            state: ScannerState::Rows(CursorGuard { cursor }),
        }
    }

    /// Scanner whose every retrieval returns `err`.
    pub fn failed(err: MapError) -> Self {
        Self {
            state: ScannerState::Failed(err),
        }
    }

    /// Decodes the first row, if any.
    ///
    /// # Errors
    /// - The stored dispatch error, cursor errors, or decode errors other
    ///   than [`MapError::NoRows`].
    pub fn read<T: DecodeRow>(self) -> MapResult<Option<T>> {
        let mut guard = self.into_guard()?;
        let Some(row) = guard.cursor.advance()? else {
            return Ok(None);
        };

        match T::decode_row(row) {
            Ok(value) => Ok(Some(value)),
            Err(MapError::NoRows) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Decodes every row in cursor order.
    ///
    /// # Errors
    /// - The stored dispatch error, cursor errors, or the first decode error;
    ///   already decoded rows are discarded.
    pub fn read_all<T: DecodeRow>(self) -> MapResult<Vec<T>> {
        let mut guard = self.into_guard()?;
        let mut items = Vec::new();

        while let Some(row) = guard.cursor.advance()? {
            match T::decode_row(row) {
                Ok(value) => items.push(value),
                Err(MapError::NoRows) => return Ok(Vec::new()),
                Err(err) => return Err(err),
            }
        }

        Ok(items)
    }

    /// Copies the first row into `target`; `false` when there is no row.
    ///
    /// # Errors
    /// - The stored dispatch error, cursor errors, or column mismatches.
    pub fn scan<S: ScanTarget>(self, target: S) -> MapResult<bool> {
        let mut guard = self.into_guard()?;
        let Some(row) = guard.cursor.advance()? else {
            return Ok(false);
        };

        match target.scan_from(row) {
            Ok(()) => Ok(true),
            Err(MapError::NoRows) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn into_guard(self) -> MapResult<CursorGuard<C>> {
        match self.state {
            ScannerState::Rows(guard) => Ok(guard),
            ScannerState::Failed(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodeRow, RowCursor, RowSource, Scanner};
    use crate::mapping::{MapError, MapResult};
    use rusqlite::types::{FromSql, Value, ValueRef};
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeRow(Vec<Value>);

    impl RowSource for FakeRow {
        fn column<T: FromSql>(&self, index: usize) -> MapResult<T> {
            let value = self
                .0
                .get(index)
                .ok_or_else(|| MapError::Decode(format!("no column {index}")))?;
            T::column_result(ValueRef::from(value))
                .map_err(|err| MapError::Decode(format!("column {index}: {err}")))
        }
    }

    struct FakeCursor {
        rows: Vec<FakeRow>,
        next: usize,
        current: Option<usize>,
        advanced: Rc<Cell<usize>>,
        released: Rc<Cell<usize>>,
    }

    impl FakeCursor {
        fn new(rows: Vec<Vec<Value>>) -> (Self, Rc<Cell<usize>>, Rc<Cell<usize>>) {
            let advanced = Rc::new(Cell::new(0));
            let released = Rc::new(Cell::new(0));
            let cursor = Self {
                rows: rows.into_iter().map(FakeRow).collect(),
                next: 0,
                current: None,
                advanced: Rc::clone(&advanced),
                released: Rc::clone(&released),
            };
            (cursor, advanced, released)
        }
    }

    impl RowCursor for FakeCursor {
        type Row = FakeRow;

        fn advance(&mut self) -> MapResult<Option<&FakeRow>> {
            self.advanced.set(self.advanced.get() + 1);
            if self.next >= self.rows.len() {
                self.current = None;
                return Ok(None);
            }
            self.current = Some(self.next);
            self.next += 1;
            Ok(self.current.map(|index| &self.rows[index]))
        }

        fn release(&mut self) {
            self.released.set(self.released.get() + 1);
        }
    }

    #[derive(Debug, PartialEq)]
    struct Item {
        id: i64,
        label: String,
    }

    impl DecodeRow for Item {
        fn decode_row<R: RowSource>(row: &R) -> MapResult<Self> {
            let id: i64 = row.column(0)?;
            if id < 0 {
                return Err(MapError::NoRows);
            }
            Ok(Self {
                id,
                label: row.column(1)?,
            })
        }
    }

    fn item_row(id: i64, label: &str) -> Vec<Value> {
        vec![Value::Integer(id), Value::Text(label.to_string())]
    }

    #[test]
    fn read_all_on_empty_cursor_returns_empty_vec_and_releases_once() {
        let (cursor, _, released) = FakeCursor::new(Vec::new());
        let items = Scanner::new(cursor).read_all::<Item>().unwrap();

        assert!(items.is_empty());
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn read_all_preserves_cursor_order() {
        let (cursor, _, released) =
            FakeCursor::new(vec![item_row(3, "c"), item_row(1, "a"), item_row(2, "b")]);
        let items = Scanner::new(cursor).read_all::<Item>().unwrap();

        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn read_all_aborts_on_decode_failure() {
        let (cursor, _, released) = FakeCursor::new(vec![
            item_row(1, "a"),
            vec![Value::Integer(2), Value::Integer(99)],
            item_row(3, "c"),
        ]);
        let err = Scanner::new(cursor).read_all::<Item>().unwrap_err();

        assert!(matches!(err, MapError::Decode(_)));
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn read_returns_first_row_without_advancing_further() {
        let (cursor, advanced, released) =
            FakeCursor::new(vec![item_row(1, "first"), item_row(2, "second")]);
        let item = Scanner::new(cursor).read::<Item>().unwrap();

        assert_eq!(
            item,
            Some(Item {
                id: 1,
                label: "first".to_string()
            })
        );
        assert_eq!(advanced.get(), 1);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn read_maps_no_rows_sentinel_to_none() {
        let (cursor, _, released) = FakeCursor::new(vec![item_row(-1, "skip")]);
        assert_eq!(Scanner::new(cursor).read::<Item>().unwrap(), None);
        assert_eq!(released.get(), 1);

        let (empty, _, released) = FakeCursor::new(Vec::new());
        assert_eq!(Scanner::new(empty).read::<Item>().unwrap(), None);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn scan_copies_columns_into_destinations() {
        let (cursor, _, released) = FakeCursor::new(vec![item_row(5, "five")]);
        let mut id = 0_i64;
        let mut label = String::new();
        let found = Scanner::new(cursor).scan((&mut id, &mut label)).unwrap();

        assert!(found);
        assert_eq!(id, 5);
        assert_eq!(label, "five");
        assert_eq!(released.get(), 1);

        let (empty, _, _) = FakeCursor::new(Vec::new());
        let mut total = -1_i64;
        assert!(!Scanner::new(empty).scan((&mut total,)).unwrap());
        assert_eq!(total, -1);
    }

    #[test]
    fn failed_scanner_replays_dispatch_error_everywhere() {
        let failed = || Scanner::<FakeCursor>::failed(MapError::Decode("dispatch".to_string()));

        assert!(failed().read::<Item>().is_err());
        assert!(failed().read_all::<Item>().is_err());
        let mut total = 0_i64;
        let err = failed().scan((&mut total,)).unwrap_err();
        assert_eq!(err.to_string(), "failed to decode row: dispatch");
    }
}
