use crate::{BoxedMigration, Migration, MigrationContext};

const STATEMENTS: &[&str] = &[
    "CREATE TABLE internationalization (
        id BIGSERIAL PRIMARY KEY,
        en TEXT NOT NULL,
        fr TEXT NOT NULL
    )",
    "CREATE TABLE tree_type (
        id BIGSERIAL PRIMARY KEY,
        name_id BIGINT NOT NULL REFERENCES internationalization (id)
    )",
    "CREATE TABLE site_type (
        id BIGSERIAL PRIMARY KEY,
        name_id BIGINT NOT NULL REFERENCES internationalization (id)
    )",
    "CREATE TABLE fertilizer_type (
        id BIGSERIAL PRIMARY KEY,
        name_id BIGINT NOT NULL REFERENCES internationalization (id)
    )",
    "CREATE TABLE mulch_layer_type (
        id BIGSERIAL PRIMARY KEY,
        name_id BIGINT NOT NULL REFERENCES internationalization (id)
    )",
    "CREATE TABLE asset (
        id BIGSERIAL PRIMARY KEY,
        path TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE coordinate (
        id BIGSERIAL PRIMARY KEY,
        dms_latitude TEXT NOT NULL,
        dms_longitude TEXT NOT NULL,
        dd_latitude DOUBLE PRECISION NOT NULL,
        dd_longitude DOUBLE PRECISION NOT NULL,
        address TEXT NOT NULL
    )",
    "CREATE TABLE contact (
        id BIGSERIAL PRIMARY KEY,
        address TEXT,
        email TEXT,
        phone TEXT,
        facebook_link TEXT,
        x_link TEXT,
        instagram_link TEXT,
        linkedin_link TEXT
    )",
    "CREATE TABLE announcement (
        id BIGSERIAL PRIMARY KEY,
        body TEXT,
        link TEXT
    )",
    "CREATE TABLE \"user\" (
        id BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'User',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        last_login_at TIMESTAMPTZ
    )",
    "CREATE TABLE site (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        is_public BOOLEAN NOT NULL DEFAULT FALSE,
        site_type_id BIGINT REFERENCES site_type (id),
        coordinate_id BIGINT REFERENCES coordinate (id),
        description TEXT,
        size TEXT,
        research_partnership BOOLEAN,
        visible_map BOOLEAN,
        visitor_count INTEGER,
        contact_id BIGINT REFERENCES contact (id),
        announcement_id BIGINT REFERENCES announcement (id),
        image_id BIGINT REFERENCES asset (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE site_tree_species (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES site (id),
        tree_type_id BIGINT NOT NULL REFERENCES tree_type (id),
        quantity INTEGER NOT NULL DEFAULT 0,
        UNIQUE (site_id, tree_type_id)
    )",
    "CREATE TABLE site_admin (
        user_id BIGINT NOT NULL REFERENCES \"user\" (id),
        site_id BIGINT NOT NULL REFERENCES site (id),
        PRIMARY KEY (user_id, site_id)
    )",
    "CREATE TABLE site_follower (
        user_id BIGINT NOT NULL REFERENCES \"user\" (id),
        site_id BIGINT NOT NULL REFERENCES site (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, site_id)
    )",
    "CREATE TABLE widget (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES site (id),
        title TEXT NOT NULL,
        body TEXT NOT NULL
    )",
    "CREATE TABLE batch (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES site (id),
        name TEXT NOT NULL,
        sponsor TEXT,
        size INTEGER,
        soil_condition TEXT,
        survived_count INTEGER,
        replace_count INTEGER,
        total_propagation INTEGER,
        image_id BIGINT REFERENCES asset (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE batch_species (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES batch (id),
        tree_type_id BIGINT NOT NULL REFERENCES tree_type (id),
        quantity INTEGER NOT NULL DEFAULT 0,
        CONSTRAINT batch_species_unique UNIQUE (batch_id, tree_type_id)
    )",
    "CREATE TABLE batch_seed (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES batch (id),
        tree_type_id BIGINT NOT NULL REFERENCES tree_type (id),
        quantity INTEGER NOT NULL DEFAULT 0,
        CONSTRAINT batch_seed_unique UNIQUE (batch_id, tree_type_id)
    )",
    "CREATE TABLE batch_fertilizer (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES batch (id),
        fertilizer_type_id BIGINT NOT NULL REFERENCES fertilizer_type (id),
        CONSTRAINT batch_fertilizer_unique UNIQUE (batch_id, fertilizer_type_id)
    )",
    "CREATE TABLE batch_mulch_layer (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES batch (id),
        mulch_layer_type_id BIGINT NOT NULL REFERENCES mulch_layer_type (id),
        CONSTRAINT batch_mulch_layer_unique UNIQUE (batch_id, mulch_layer_type_id)
    )",
    "CREATE TABLE batch_supported_species (
        id BIGSERIAL PRIMARY KEY,
        batch_id BIGINT NOT NULL REFERENCES batch (id),
        tree_type_id BIGINT NOT NULL REFERENCES tree_type (id),
        CONSTRAINT batch_supported_species_unique UNIQUE (batch_id, tree_type_id)
    )",
    "CREATE TABLE post (
        id BIGSERIAL PRIMARY KEY,
        site_id BIGINT NOT NULL REFERENCES site (id),
        body TEXT NOT NULL,
        share_count INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE post_asset (
        post_id BIGINT NOT NULL REFERENCES post (id),
        asset_id BIGINT NOT NULL REFERENCES asset (id),
        PRIMARY KEY (post_id, asset_id)
    )",
    "CREATE TABLE comment (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES post (id),
        user_id BIGINT NOT NULL REFERENCES \"user\" (id),
        body TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE post_like (
        id BIGSERIAL PRIMARY KEY,
        post_id BIGINT NOT NULL REFERENCES post (id),
        user_id BIGINT NOT NULL REFERENCES \"user\" (id),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX batch_site_id_idx ON batch (site_id)",
    "CREATE INDEX post_site_id_created_at_idx ON post (site_id, created_at DESC)",
    "CREATE INDEX comment_post_id_idx ON comment (post_id)",
];

fn run<'a>(ctx: &'a mut MigrationContext<'a>) -> BoxedMigration<'a> {
    Box::pin(async move {
        for sql in STATEMENTS {
            ctx.execute(sql).await?;
        }
        Ok(())
    })
}

inventory::submit!(Migration::new("2024_03_20_000000", "initial", run));
