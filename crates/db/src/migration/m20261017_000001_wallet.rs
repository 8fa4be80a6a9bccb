//! Wallet schema migration.
//!
//! Creates the wallet enums, tables, indexes and the append-only ledger
//! trigger.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: TABLES
        // ============================================================
        db.execute_unprepared(WALLET_ACCOUNTS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(RECEIVER_ACCOUNTS_SQL).await?;
        db.execute_unprepared(DEPOSITS_SQL).await?;
        db.execute_unprepared(WALLET_TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE wallet_charge_type AS ENUM ('PERCENTAGE', 'FIXED');

CREATE TYPE wallet_transaction_type AS ENUM ('CHARGE', 'DEPOSIT', 'ADJUSTMENT');

CREATE TYPE wallet_deposit_status AS ENUM ('PENDING', 'VERIFIED', 'UNVERIFIED', 'EXPIRED');

CREATE TYPE receiver_account_status AS ENUM ('ACTIVE', 'INACTIVE');
";

const WALLET_ACCOUNTS_SQL: &str = r"
CREATE TABLE merchant_wallet_accounts (
    merchant_id     UUID PRIMARY KEY,
    balance         NUMERIC(20, 2) NOT NULL DEFAULT 0,
    wallet_enabled  BOOLEAN NOT NULL DEFAULT FALSE,
    charge_type     wallet_charge_type,
    charge_value    NUMERIC(20, 4),
    min_balance     NUMERIC(20, 2),
    -- Incremented on every balance write; guards the projection update.
    version         BIGINT NOT NULL DEFAULT 0,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_wallet_charge_pair CHECK (
        (charge_type IS NULL) = (charge_value IS NULL)
    ),
    CONSTRAINT chk_wallet_charge_value CHECK (charge_value IS NULL OR charge_value >= 0),
    CONSTRAINT chk_wallet_percentage CHECK (
        charge_type IS DISTINCT FROM 'PERCENTAGE' OR charge_value <= 100
    ),
    CONSTRAINT chk_wallet_min_balance CHECK (min_balance IS NULL OR min_balance >= 0)
);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id                      UUID PRIMARY KEY,
    merchant_id             UUID NOT NULL REFERENCES merchant_wallet_accounts(merchant_id),
    amount                  NUMERIC(20, 2) NOT NULL,
    wallet_charged          BOOLEAN NOT NULL DEFAULT FALSE,
    wallet_transaction_id   UUID,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_payments_merchant ON payments(merchant_id, created_at DESC);
";

const RECEIVER_ACCOUNTS_SQL: &str = r"
CREATE TABLE wallet_deposit_receiver_accounts (
    id                  UUID PRIMARY KEY,
    provider            VARCHAR(32) NOT NULL,
    receiver_account    VARCHAR(64) NOT NULL,
    receiver_name       VARCHAR(255),
    label               VARCHAR(255),
    status              receiver_account_status NOT NULL DEFAULT 'ACTIVE',
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_receiver_accounts_provider_account UNIQUE (provider, receiver_account)
);

CREATE INDEX idx_receiver_accounts_provider_status
    ON wallet_deposit_receiver_accounts(provider, status);
";

const DEPOSITS_SQL: &str = r"
CREATE TABLE wallet_deposits (
    id                      UUID PRIMARY KEY,
    merchant_id             UUID NOT NULL REFERENCES merchant_wallet_accounts(merchant_id),
    provider                VARCHAR(32) NOT NULL,
    reference               VARCHAR(128) NOT NULL,
    amount                  NUMERIC(20, 2) NOT NULL,
    receiver_account_id     UUID REFERENCES wallet_deposit_receiver_accounts(id),
    status                  wallet_deposit_status NOT NULL DEFAULT 'PENDING',
    expires_at              TIMESTAMPTZ,
    verified_at             TIMESTAMPTZ,
    verified_by             VARCHAR(255),
    verification_payload    JSONB,
    error_message           TEXT,
    wallet_transaction_id   UUID,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_deposit_amount_non_negative CHECK (amount >= 0),
    CONSTRAINT chk_deposit_verified_fields CHECK (
        status <> 'VERIFIED' OR verified_at IS NOT NULL
    )
);

-- A (merchant, provider, reference) is credited at most once
CREATE UNIQUE INDEX uq_wallet_deposits_verified_reference
    ON wallet_deposits(merchant_id, provider, reference)
    WHERE status = 'VERIFIED';

CREATE INDEX idx_wallet_deposits_candidates
    ON wallet_deposits(merchant_id, provider, status, created_at DESC);

CREATE INDEX idx_wallet_deposits_reference
    ON wallet_deposits(merchant_id, provider, reference);
";

const WALLET_TRANSACTIONS_SQL: &str = r"
CREATE TABLE wallet_transactions (
    id                  UUID PRIMARY KEY,
    merchant_id         UUID NOT NULL REFERENCES merchant_wallet_accounts(merchant_id),
    -- Position in the merchant's ledger; equals the account version it produced.
    sequence            BIGINT NOT NULL,
    transaction_type    wallet_transaction_type NOT NULL,
    amount              NUMERIC(20, 2) NOT NULL,
    balance_before      NUMERIC(20, 2) NOT NULL,
    balance_after       NUMERIC(20, 2) NOT NULL,
    payment_id          UUID,
    deposit_id          UUID REFERENCES wallet_deposits(id),
    description         TEXT NOT NULL,
    metadata            JSONB,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT uq_wallet_transactions_sequence UNIQUE (merchant_id, sequence),
    CONSTRAINT chk_wallet_tx_arithmetic CHECK (balance_after = balance_before + amount),
    CONSTRAINT chk_wallet_tx_nonzero CHECK (amount <> 0),
    CONSTRAINT chk_wallet_tx_charge_sign CHECK (transaction_type <> 'CHARGE' OR amount < 0),
    CONSTRAINT chk_wallet_tx_deposit_sign CHECK (transaction_type <> 'DEPOSIT' OR amount > 0)
);

-- A payment is charged at most once
CREATE UNIQUE INDEX uq_wallet_transactions_charge_payment
    ON wallet_transactions(payment_id)
    WHERE transaction_type = 'CHARGE';

CREATE INDEX idx_wallet_transactions_merchant_created
    ON wallet_transactions(merchant_id, created_at DESC);

ALTER TABLE wallet_deposits
    ADD CONSTRAINT fk_wallet_deposits_transaction
    FOREIGN KEY (wallet_transaction_id) REFERENCES wallet_transactions(id);

ALTER TABLE payments
    ADD CONSTRAINT fk_payments_wallet_transaction
    FOREIGN KEY (wallet_transaction_id) REFERENCES wallet_transactions(id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_wallet_transaction_modification
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_wallet_transaction_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'wallet_transactions is append-only: % is not allowed', TG_OP;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_wallet_transactions_append_only
BEFORE UPDATE OR DELETE ON wallet_transactions
FOR EACH ROW
EXECUTE FUNCTION prevent_wallet_transaction_modification();

-- ============================================================
-- FUNCTION: set_updated_at
-- ============================================================
CREATE OR REPLACE FUNCTION set_updated_at()
RETURNS TRIGGER AS $$
BEGIN
    NEW.updated_at = NOW();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_merchant_wallet_accounts_updated_at
BEFORE UPDATE ON merchant_wallet_accounts
FOR EACH ROW EXECUTE FUNCTION set_updated_at();

CREATE TRIGGER trg_wallet_deposits_updated_at
BEFORE UPDATE ON wallet_deposits
FOR EACH ROW EXECUTE FUNCTION set_updated_at();

CREATE TRIGGER trg_receiver_accounts_updated_at
BEFORE UPDATE ON wallet_deposit_receiver_accounts
FOR EACH ROW EXECUTE FUNCTION set_updated_at();

CREATE TRIGGER trg_payments_updated_at
BEFORE UPDATE ON payments
FOR EACH ROW EXECUTE FUNCTION set_updated_at();
";

const DROP_ALL_SQL: &str = r"
ALTER TABLE IF EXISTS payments DROP CONSTRAINT IF EXISTS fk_payments_wallet_transaction;
ALTER TABLE IF EXISTS wallet_deposits DROP CONSTRAINT IF EXISTS fk_wallet_deposits_transaction;
DROP TABLE IF EXISTS wallet_transactions CASCADE;
DROP TABLE IF EXISTS wallet_deposits CASCADE;
DROP TABLE IF EXISTS wallet_deposit_receiver_accounts CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS merchant_wallet_accounts CASCADE;
DROP FUNCTION IF EXISTS prevent_wallet_transaction_modification();
DROP FUNCTION IF EXISTS set_updated_at();
DROP TYPE IF EXISTS receiver_account_status;
DROP TYPE IF EXISTS wallet_deposit_status;
DROP TYPE IF EXISTS wallet_transaction_type;
DROP TYPE IF EXISTS wallet_charge_type;
";
