//! PostgreSQL bill store. Status transitions are conditional UPDATE
//! statements (`WHERE status = ...`) so concurrent callers can never move the
//! same row twice, and multi-step operations run inside one transaction that
//! locks the bill row first.

use log::error;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row, Transaction};
use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::database::DB_ACQUIRE_TIMEOUT_SECONDS;
use crate::server::model::bill::{
    Bill, BillRangeFilter, BillStatus, NewOrder, NewOrderItem, Order, OrderItem, OrderItemStatus,
};
use crate::server::repository::{db_err, BillsStore, PgStore};
use crate::server::util::time;

/// the shared bill read shape: nested orders and items, with declined and
/// removed items hidden from normal reads
const BILL_SELECT: &str = r#"
    SELECT b.id, b.restaurant_id, b.table_id, b.status, b.created_at, b.closed_at,
           b.payed_service_fee_in_percentage,
           o.id AS order_id, o.customer_name,
           i.id AS item_id, i.menu_item_id, i.payed_value, i.status AS item_status
    FROM bill b
    LEFT JOIN "order" o ON o.bill_id = b.id
    LEFT JOIN order_item i ON i.order_id = o.id AND i.status NOT IN ('declined', 'removed')
"#;

const IN_ORGANIZATION: &str =
    "EXISTS (SELECT 1 FROM restaurant r WHERE r.id = b.restaurant_id AND r.organization_id = $2)";

impl BillsStore for PgStore {
    async fn find_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let clause = format!("WHERE b.id = $1 AND {IN_ORGANIZATION}");
        let bills = select_bills(&*conn, &clause, &[&bill_id, &organization_id]).await?;
        bills
            .into_iter()
            .next()
            .ok_or_else(|| CustomError::not_found("Bill not found"))
    }

    async fn find_many(
        &self,
        organization_id: Uuid,
        filter: &BillRangeFilter,
    ) -> Result<Vec<Bill>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let statuses: Vec<&str> = filter.status_list.iter().map(|s| s.as_str()).collect();
        let clause = r#"
            WHERE b.created_at >= $2 AND b.created_at <= $3 AND b.status = ANY($4)
              AND EXISTS (SELECT 1 FROM restaurant r
                          WHERE r.id = b.restaurant_id AND r.organization_id = $1)
        "#;
        select_bills(
            &*conn,
            clause,
            &[
                &organization_id,
                &filter.start_date,
                &filter.end_date,
                &statuses,
            ],
        )
        .await
    }

    async fn find_active_for_table(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let clause =
            "WHERE b.restaurant_id = $1 AND b.table_id = $2 AND b.status IN ('pending', 'active')";
        let bills = select_bills(&*conn, clause, &[&restaurant_id, &table_id]).await?;
        Ok(bills.into_iter().next())
    }

    async fn find_active_for_table_in_organization(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let known = conn
            .query(
                r#"
                SELECT t.id
                FROM "table" t
                JOIN restaurant r ON r.id = t.restaurant_id
                WHERE t.id = $1 AND r.organization_id = $2
                "#,
                &[&table_id, &organization_id],
            )
            .await
            .map_err(db_err("lookup table for organization"))?;
        if known.is_empty() {
            return Err(CustomError::not_found("Table or Restaurant not found"));
        }

        let clause = format!(
            "WHERE b.table_id = $1 AND b.status IN ('pending', 'active') AND {IN_ORGANIZATION}"
        );
        let bills = select_bills(&*conn, &clause, &[&table_id, &organization_id]).await?;
        Ok(bills.into_iter().next())
    }

    async fn create_pending(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
        orders: &[NewOrder],
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin create_pending"))?;

        let bill_id = Uuid::now_v7();
        txn.execute(
            r#"
            INSERT INTO bill (id, restaurant_id, table_id, status, created_at)
            VALUES ($1, $2, $3, 'pending', $4)
            "#,
            &[&bill_id, &restaurant_id, &table_id, &time::helper::get_utc_now()],
        )
        .await
        .map_err(map_bill_insert_err)?;

        for order in orders {
            let order_id = insert_order(&txn, bill_id, &order.customer_name).await?;
            insert_order_items(&txn, order_id, &order.items, OrderItemStatus::Pending).await?;
        }

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit().await.map_err(db_err("commit create_pending"))?;
        Ok(bill)
    }

    async fn create_confirmed(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin create_confirmed"))?;

        let bill_id = Uuid::now_v7();
        let inserted = txn
            .execute(
                r#"
                INSERT INTO bill (id, restaurant_id, table_id, status, created_at)
                SELECT $1, r.id, $2, 'active', $3
                FROM restaurant r
                WHERE r.organization_id = $4
                "#,
                &[
                    &bill_id,
                    &table_id,
                    &time::helper::get_utc_now(),
                    &organization_id,
                ],
            )
            .await
            .map_err(map_bill_insert_err)?;
        if inserted == 0 {
            return Err(CustomError::not_found("Restaurant not found"));
        }

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit()
            .await
            .map_err(db_err("commit create_confirmed"))?;
        Ok(bill)
    }

    async fn create_instant(
        &self,
        organization_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin create_instant"))?;

        let restaurant = txn
            .query_opt(
                "SELECT id, service_fee_in_percentage FROM restaurant WHERE organization_id = $1",
                &[&organization_id],
            )
            .await
            .map_err(db_err("lookup restaurant for organization"))?
            .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
        let restaurant_id: Uuid = restaurant.get("id");
        let fee: rust_decimal::Decimal = restaurant.get("service_fee_in_percentage");

        // an instant sale closes at birth, so the fee freeze and closed_at
        // stamp happen right here
        let bill_id = Uuid::now_v7();
        let now = time::helper::get_utc_now();
        txn.execute(
            r#"
            INSERT INTO bill (id, restaurant_id, table_id, status, created_at, closed_at,
                              payed_service_fee_in_percentage)
            VALUES ($1, $2, NULL, 'closed', $3, $3, $4)
            "#,
            &[&bill_id, &restaurant_id, &now, &fee],
        )
        .await
        .map_err(db_err("insert instant bill"))?;

        let order_id = insert_order(&txn, bill_id, customer_name).await?;
        insert_order_items(&txn, order_id, items, OrderItemStatus::Active).await?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit().await.map_err(db_err("commit create_instant"))?;
        Ok(bill)
    }

    async fn append_pending_items(
        &self,
        restaurant_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin append_pending_items"))?;

        // lock the bill row so a concurrent close cannot slide between our
        // status check and the item insert
        txn.query_opt(
            r#"
            SELECT id FROM bill
            WHERE id = $1 AND restaurant_id = $2 AND status IN ('pending', 'active')
            FOR UPDATE
            "#,
            &[&bill_id, &restaurant_id],
        )
        .await
        .map_err(db_err("lock bill for append"))?
        .ok_or_else(|| CustomError::not_found("Bill not found"))?;

        append_items_in_txn(&txn, bill_id, customer_name, items, OrderItemStatus::Pending).await?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit()
            .await
            .map_err(db_err("commit append_pending_items"))?;
        Ok(bill)
    }

    async fn append_active_items(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin append_active_items"))?;

        txn.query_opt(
            r#"
            SELECT b.id FROM bill b
            JOIN restaurant r ON r.id = b.restaurant_id
            WHERE b.id = $1 AND r.organization_id = $2 AND b.status IN ('pending', 'active')
            FOR UPDATE OF b
            "#,
            &[&bill_id, &organization_id],
        )
        .await
        .map_err(db_err("lock bill for append"))?
        .ok_or_else(|| CustomError::not_found("Bill not found"))?;

        append_items_in_txn(&txn, bill_id, customer_name, items, OrderItemStatus::Active).await?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit()
            .await
            .map_err(db_err("commit append_active_items"))?;
        Ok(bill)
    }

    async fn confirm_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin confirm_one"))?;

        let (status, table_id) = lock_bill(&txn, organization_id, bill_id).await?;
        if status != BillStatus::Pending {
            return Err(CustomError::conflict("Bill is not pending"));
        }

        // the table may have been taken by a confirmed bill in the meantime
        if let Some(table_id) = table_id {
            let taken = txn
                .query(
                    r#"
                    SELECT 1 FROM bill b
                    JOIN restaurant r ON r.id = b.restaurant_id
                    WHERE b.table_id = $1 AND b.status = 'active' AND b.id <> $2
                      AND r.organization_id = $3
                    LIMIT 1
                    "#,
                    &[&table_id, &bill_id, &organization_id],
                )
                .await
                .map_err(db_err("re-check table occupancy"))?;
            if !taken.is_empty() {
                return Err(CustomError::conflict("Table is not available"));
            }
        }

        txn.execute(
            "UPDATE bill SET status = 'active' WHERE id = $1 AND status = 'pending'",
            &[&bill_id],
        )
        .await
        .map_err(db_err("confirm bill"))?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit().await.map_err(db_err("commit confirm_one"))?;
        Ok(bill)
    }

    async fn decline_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin decline_one"))?;

        let (status, _) = lock_bill(&txn, organization_id, bill_id).await?;
        if status != BillStatus::Pending {
            return Err(CustomError::conflict("Bill is not pending"));
        }

        txn.execute(
            r#"
            UPDATE order_item i SET status = 'declined'
            FROM "order" o
            WHERE i.order_id = o.id AND o.bill_id = $1 AND i.status = 'pending'
            "#,
            &[&bill_id],
        )
        .await
        .map_err(db_err("decline order items"))?;

        txn.execute(
            "UPDATE bill SET status = 'declined', closed_at = $2 WHERE id = $1 AND status = 'pending'",
            &[&bill_id, &time::helper::get_utc_now()],
        )
        .await
        .map_err(db_err("decline bill"))?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit().await.map_err(db_err("commit decline_one"))?;
        Ok(bill)
    }

    async fn close_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn.transaction().await.map_err(db_err("begin close_one"))?;

        let locked = txn
            .query_opt(
                r#"
                SELECT b.status, r.service_fee_in_percentage
                FROM bill b
                JOIN restaurant r ON r.id = b.restaurant_id
                WHERE b.id = $1 AND r.organization_id = $2
                FOR UPDATE OF b
                "#,
                &[&bill_id, &organization_id],
            )
            .await
            .map_err(db_err("lock bill for close"))?
            .ok_or_else(|| CustomError::not_found("Bill not found"))?;
        if parse_bill_status(locked.get("status"))? != BillStatus::Active {
            return Err(CustomError::conflict("Bill is not active"));
        }

        // re-validated inside the same transaction that closes the bill, so an
        // interleaved pending append makes this close fail instead of closing
        // over an item it never saw
        let pending = txn
            .query(
                r#"
                SELECT i.id FROM order_item i
                JOIN "order" o ON o.id = i.order_id
                WHERE o.bill_id = $1 AND i.status = 'pending'
                LIMIT 1
                "#,
                &[&bill_id],
            )
            .await
            .map_err(db_err("check pending items"))?;
        if !pending.is_empty() {
            return Err(CustomError::conflict("Bill has pending order items"));
        }

        txn.execute(
            r#"
            UPDATE order_item i SET status = 'closed'
            FROM "order" o
            WHERE i.order_id = o.id AND o.bill_id = $1 AND i.status = 'active'
            "#,
            &[&bill_id],
        )
        .await
        .map_err(db_err("close order items"))?;

        let fee: rust_decimal::Decimal = locked.get("service_fee_in_percentage");
        txn.execute(
            r#"
            UPDATE bill
            SET status = 'closed', closed_at = $2, payed_service_fee_in_percentage = $3
            WHERE id = $1 AND status = 'active'
            "#,
            &[&bill_id, &time::helper::get_utc_now(), &fee],
        )
        .await
        .map_err(db_err("close bill"))?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit().await.map_err(db_err("commit close_one"))?;
        Ok(bill)
    }

    async fn set_items_status(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        item_ids: &[Uuid],
        from: &[OrderItemStatus],
        to: OrderItemStatus,
    ) -> Result<Bill, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin set_items_status"))?;

        let (status, _) = lock_bill(&txn, organization_id, bill_id).await?;
        if status != BillStatus::Active {
            return Err(CustomError::conflict("Bill is not active"));
        }

        // one conditional statement: items outside `from` are silently skipped
        let ids: Vec<Uuid> = item_ids.to_vec();
        let from: Vec<&str> = from.iter().map(|s| s.as_str()).collect();
        txn.execute(
            r#"
            UPDATE order_item i SET status = $4
            FROM "order" o
            WHERE i.order_id = o.id AND o.bill_id = $1
              AND i.id = ANY($2) AND i.status = ANY($3)
            "#,
            &[&bill_id, &ids, &from, &to.as_str()],
        )
        .await
        .map_err(db_err("bulk update order items"))?;

        let bill = fetch_bill_in_txn(&txn, bill_id).await?;
        txn.commit()
            .await
            .map_err(db_err("commit set_items_status"))?;
        Ok(bill)
    }
}

/// lock the bill row for the rest of the transaction and return its current
/// status and table
async fn lock_bill(
    txn: &Transaction<'_>,
    organization_id: Uuid,
    bill_id: Uuid,
) -> Result<(BillStatus, Option<Uuid>), CustomError> {
    let row = txn
        .query_opt(
            r#"
            SELECT b.status, b.table_id
            FROM bill b
            JOIN restaurant r ON r.id = b.restaurant_id
            WHERE b.id = $1 AND r.organization_id = $2
            FOR UPDATE OF b
            "#,
            &[&bill_id, &organization_id],
        )
        .await
        .map_err(db_err("lock bill"))?
        .ok_or_else(|| CustomError::not_found("Bill not found"))?;
    Ok((parse_bill_status(row.get("status"))?, row.get("table_id")))
}

async fn insert_order(
    txn: &Transaction<'_>,
    bill_id: Uuid,
    customer_name: &str,
) -> Result<Uuid, CustomError> {
    let order_id = Uuid::now_v7();
    txn.execute(
        r#"INSERT INTO "order" (id, bill_id, customer_name) VALUES ($1, $2, $3)"#,
        &[&order_id, &bill_id, &customer_name],
    )
    .await
    .map_err(db_err("insert order"))?;
    Ok(order_id)
}

async fn insert_order_items(
    txn: &Transaction<'_>,
    order_id: Uuid,
    items: &[NewOrderItem],
    status: OrderItemStatus,
) -> Result<(), CustomError> {
    const COLUMN_LEN: usize = 5;
    if items.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = items.iter().map(|_| Uuid::now_v7()).collect();
    let status = status.as_str();
    let mut stmt =
        "INSERT INTO order_item(id, order_id, menu_item_id, payed_value, status) VALUES".to_string();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(items.len() * COLUMN_LEN);
    let mut idx = 1;
    for (i, item) in items.iter().enumerate() {
        let maybe_comma = if i != items.len() - 1 { "," } else { "" };
        stmt.extend(
            format!(
                " (${}, ${}, ${}, ${}, ${}){}",
                idx,
                idx + 1,
                idx + 2,
                idx + 3,
                idx + 4,
                maybe_comma
            )
            .chars(),
        );
        params.extend([
            &ids[i] as &(dyn ToSql + Sync),
            &order_id,
            &item.menu_item_id,
            &item.payed_value,
            &status,
        ]);
        idx += COLUMN_LEN;
    }
    txn.execute(&stmt, params.as_slice())
        .await
        .map_err(db_err("insert order items"))?;
    Ok(())
}

/// merge into the customer's existing order on this bill, or start a new one
async fn append_items_in_txn(
    txn: &Transaction<'_>,
    bill_id: Uuid,
    customer_name: &str,
    items: &[NewOrderItem],
    status: OrderItemStatus,
) -> Result<(), CustomError> {
    let existing = txn
        .query_opt(
            r#"SELECT id FROM "order" WHERE bill_id = $1 AND customer_name = $2 LIMIT 1"#,
            &[&bill_id, &customer_name],
        )
        .await
        .map_err(db_err("lookup customer order"))?;
    let order_id = match existing {
        Some(row) => row.get("id"),
        None => insert_order(txn, bill_id, customer_name).await?,
    };
    insert_order_items(txn, order_id, items, status).await
}

async fn fetch_bill_in_txn(txn: &Transaction<'_>, bill_id: Uuid) -> Result<Bill, CustomError> {
    let bills = select_bills(txn, "WHERE b.id = $1", &[&bill_id]).await?;
    bills
        .into_iter()
        .next()
        .ok_or_else(|| CustomError::not_found("Bill not found"))
}

async fn select_bills<C: GenericClient>(
    client: &C,
    clause: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<Bill>, CustomError> {
    let stmt = format!("{BILL_SELECT} {clause} ORDER BY b.created_at, b.id, o.id, i.id");
    let rows = client
        .query(&stmt, params)
        .await
        .map_err(db_err("select bills"))?;
    fold_bills(&rows)
}

/// rows arrive sorted by bill, order, item; fold them into nested bills
fn fold_bills(rows: &[Row]) -> Result<Vec<Bill>, CustomError> {
    let mut bills: Vec<Bill> = Vec::new();
    for row in rows {
        let bill_id: Uuid = row.get("id");
        if bills.last().map(|b| b.id) != Some(bill_id) {
            bills.push(Bill {
                id: bill_id,
                restaurant_id: row.get("restaurant_id"),
                table_id: row.get("table_id"),
                status: parse_bill_status(row.get("status"))?,
                created_at: row.get("created_at"),
                closed_at: row.get("closed_at"),
                payed_service_fee_in_percentage: row.get("payed_service_fee_in_percentage"),
                orders: Vec::new(),
            });
        }
        let Some(order_id) = row.get::<_, Option<Uuid>>("order_id") else {
            continue;
        };
        let bill = bills.last_mut().expect("bill pushed above");
        if bill.orders.last().map(|o| o.id) != Some(order_id) {
            bill.orders.push(Order {
                id: order_id,
                customer_name: row.get("customer_name"),
                items: Vec::new(),
            });
        }
        let Some(item_id) = row.get::<_, Option<Uuid>>("item_id") else {
            continue;
        };
        let order = bill.orders.last_mut().expect("order pushed above");
        let status = parse_item_status(row.get("item_status"))?;
        debug_assert!(!status.is_hidden(), "the select filters hidden items");
        order.items.push(OrderItem {
            id: item_id,
            menu_item_id: row.get("menu_item_id"),
            payed_value: row.get("payed_value"),
            status,
        });
    }
    Ok(bills)
}

fn parse_bill_status(s: &str) -> Result<BillStatus, CustomError> {
    s.parse().map_err(|e: String| {
        error!("unexpected bill row, {}", e);
        CustomError::DbError
    })
}

fn parse_item_status(s: &str) -> Result<OrderItemStatus, CustomError> {
    s.parse().map_err(|e: String| {
        error!("unexpected order item row, {}", e);
        CustomError::DbError
    })
}

fn map_bill_insert_err(e: tokio_postgres::Error) -> CustomError {
    // the partial unique index on open bills per table turns the
    // check-then-act race into a conflict here
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return CustomError::conflict("There's already an active bill for this table");
    }
    db_err("insert bill")(e)
}
