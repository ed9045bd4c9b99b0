//! Demo data for development databases.
//!
//! Seeding is skipped when any user exists, so running it twice is harmless.

use canopeum::{Coordinate, Role};
use jiff::{SignedDuration, Timestamp};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::queries::batch::{Composition, NewBatch, SponsorInput, insert_batch};
use crate::queries::lookup::{LookupTable, insert};
use crate::queries::site::{
    ContactUpdate, NewSite, create_site, replace_tree_species, update_announcement, update_contact,
};
use crate::queries::user::{NewUser, grant_site_admin, insert_user, user_count};
use crate::{Connection, ConnectionExt, DbError, Result};

/// A demo login. Passwords are hashed by the caller.
#[derive(Debug, Clone, Copy)]
pub struct DemoAccount {
    pub username: &'static str,
    pub email: &'static str,
    pub password: &'static str,
    pub role: Role,
}

pub const DEMO_ACCOUNTS: &[DemoAccount] = &[
    DemoAccount {
        username: "admin",
        email: "admin@beslogic.com",
        password: "Adminbeslogic!",
        role: Role::MegaAdmin,
    },
    DemoAccount {
        username: "TyrionLannister",
        email: "tyrion@lannister.com",
        password: "tyrion123",
        role: Role::ForestSteward,
    },
    DemoAccount {
        username: "DaenerysTargaryen",
        email: "daenerys@targaryen.com",
        password: "daenerys123",
        role: Role::ForestSteward,
    },
    DemoAccount {
        username: "JonSnow",
        email: "jon@snow.com",
        password: "jon123",
        role: Role::ForestSteward,
    },
    DemoAccount {
        username: "OberynMartell",
        email: "oberyn@martell.com",
        password: "oberyn123",
        role: Role::ForestSteward,
    },
    DemoAccount {
        username: "NormalUser",
        email: "normal@user.com",
        password: "normal123",
        role: Role::User,
    },
];

const FERTILIZER_TYPES: &[(&str, &str)] = &[
    ("Synthetic", "Synthétique"),
    ("Inoculant", "Inoculant"),
    ("Organic compost", "Compost organique"),
    ("Manure", "Fumier"),
    ("Bone meal", "Farine d'os"),
    ("Fish emulsion", "Émulsion de poisson"),
    ("Blood meal", "Farine de sang"),
    ("Seaweed fertilizer", "Engrais d'algues"),
    ("Bat guano", "Guano de chauve-souris"),
    ("Worm castings", "Moulée de vers"),
    ("Compost tea", "Thé de compost"),
    ("Wood ash", "Cendre de bois"),
    ("Rock phosphate", "Phosphate de roche"),
    ("Greensand", "Sable vert"),
    ("Alfalfa meal", "Farine d'alfalfa"),
    ("Cottonseed meal", "Farine de tourteau de coton"),
    ("Feather meal", "Farine de plumes"),
    ("Humic acid", "Acide humique"),
];

const MULCH_LAYER_TYPES: &[(&str, &str)] = &[
    ("Sheep wool", "Laine de mouton"),
    ("Cardboard", "Carton"),
    ("Compost", "Compost"),
    ("Woodchips", "Copeaux de bois"),
    ("Saw dust", "Poussière de scie"),
    ("Corn husk", "Feuille de maïs"),
];

/// Map pins are keyed on this order.
const SITE_TYPES: &[(&str, &str)] = &[
    ("Canopeum", "Canopeum"),
    ("Parks", "Parcs"),
    ("Indigenous community", "Communauté Indigène"),
    ("Educational Facility", "Établissement d'enseignement"),
    ("Farms Land", "Terres agricoles"),
    ("Corporate Lot", "Lot d'entreprise"),
];

const TREE_TYPES: &[(&str, &str)] = &[
    ("Balsam Fir", "Sapin baumier"),
    ("Black Maple", "Érable noir"),
    ("Red Maple", "Érable rouge"),
    ("Silver Maple", "Érable argenté"),
    ("Sugar Maple", "Érable à sucre"),
    ("Ohio Buckeye", "Marronnier d'Ohio"),
    ("Speckled Alder", "Aulne tacheté"),
    ("Green Alder", "Aulne vert"),
    ("Serviceberries", "Amélanchier"),
    ("Black Chokeberry", "Aronie noire"),
    ("Yellow Birch", "Bouleau jaune"),
    ("White Birch", "Bouleau blanc"),
    ("Gray Birch", "Bouleau gris"),
    ("Blue Beech", "Hêtre bleu"),
    ("Bitternut Hickory", "Noyer amer"),
    ("Shagbark Hickory", "Noyer à écorce shaggy"),
    ("Northern Hackberry", "Micocoulier occidental"),
    ("Redbud", "Gainier de Virginie"),
    ("Silky Dogwood", "Cornouiller soyeux"),
    ("Flowering Dogwood", "Cornouiller à fleurs"),
    ("Redosier Dogwood", "Cornouiller stolonifère"),
    ("American Hazelnut", "Noisetier d'Amérique"),
    ("Hawthorns", "Aubépines"),
    ("American Beech", "Hêtre d'Amérique"),
    ("White Ash", "Frêne blanc"),
    ("Black Ash", "Frêne noir"),
    ("Honey Locust", "Faux-acacia"),
    ("Witch-Hazel", "Hamamélis de Virginie"),
    ("Winterberry", "Houx d'hiver"),
    ("Butternut", "Noyer cendré"),
    ("Black Walnut", "Noyer noir"),
    ("Eastern Red Cedar", "Genévrier rouge de l'Est"),
    ("Tamarac", "Mélèze laricin"),
    ("Tulip-Tree", "Tulipier de Virginie"),
    ("Ironwood", "Ostryer de Virginie"),
    ("Ninebark", "Physocarpe"),
    ("White Spruce", "Épinette blanche"),
    ("Black Spruce", "Épinette noire"),
    ("Red Spruce", "Épinette rouge"),
    ("Jack Pine", "Pin gris"),
    ("Red Pine", "Pin rouge"),
    ("Eastern White Pine", "Pin blanc de l'Est"),
    ("Trembling Aspen", "Peuplier faux-tremble"),
    ("Black Cherry", "Cerisier noir"),
    ("White Oak", "Chêne blanc"),
    ("Bur Oak", "Chêne bur"),
    ("Red Oak", "Chêne rouge"),
    ("Staghorn Sumac", "Sumac vinaigrier"),
    ("Willows", "Saules"),
    ("Black Elderberry", "Sureau noir"),
    ("American Mountain Ash", "Sorbier d'Amérique"),
    ("White Cedar", "Thuya occidental"),
    ("Basswood", "Tilleul d'Amérique"),
    ("Eastern Hemlock", "Pruche de l'Est"),
    ("American Elm", "Orme d'Amérique"),
    ("Nannyberry", "Viorne à feuilles de viorne"),
];

const BATCH_NAMES: &[&str] = &[
    "First Batch",
    "Second Batch",
    "Third Batch",
    "Fourth Batch",
    "Fifth Batch",
    "Sixth Batch",
    "Seventh Batch",
    "Eighth Batch",
];

const SPONSOR_NAMES: &[&str] = &[
    "Green Earth Initiative",
    "EcoRoots Corporation",
    "Sustainable Growth Group",
    "Forest Futures Fund",
    "Green Horizons Alliance",
    "Tree of Life Foundation",
    "Evergreen Solutions",
    "Leaf Legacy Group",
    "Planet Guardians Inc.",
    "Roots of Tomorrow",
    "Nature's Canopy Collective",
    "Oxygen for All Co.",
    "Verdant Ventures",
    "ForestFlow Enterprises",
    "Seedling Sustainability Co.",
    "Pure Green Partners",
    "Branch Out Initiative",
    "Nature Nurturers",
    "Earthwise Ecosystems",
    "Renewed Forest Foundation",
    "EcoSphere Solutions",
    "Reforest Co.",
    "Grow Green Initiative",
    "Flourishing Forest Foundation",
    "Sapling Supporters Co.",
    "Woodland Warriors",
    "TreeTop Trust",
    "The Canopy Collective",
    "TreeTrail Trust",
    "ForestFront Alliance",
    "Verdant Visions Fund",
    "GreenFuture Trust",
];

struct DemoSite {
    name: &'static str,
    is_public: bool,
    /// Index into `SITE_TYPES`.
    site_type: usize,
    dms_latitude: &'static str,
    dms_longitude: &'static str,
    address: &'static str,
    description: &'static str,
    size: &'static str,
    research_partnership: bool,
    visitor_count: i32,
    email: &'static str,
    phone: &'static str,
    announcement: &'static str,
    link: &'static str,
    /// Site species quantities match batch quantities exactly.
    fully_sponsored: bool,
}

const DEMO_SITES: &[DemoSite] = &[
    DemoSite {
        name: "Canopeum",
        is_public: true,
        site_type: 0,
        dms_latitude: "45°30'06.1\"N",
        dms_longitude: "73°34'02.3\"W",
        address: "721 Walker avenue, Office 200 Montréal, QC H4C 2H5",
        description: "Canopeum is a park in Montreal",
        size: "1000",
        research_partnership: true,
        visitor_count: 100,
        email: "info@canopeum.com",
        phone: "+1 514 741-5008",
        announcement: "We currently have 20000 healthy seedlings of different species, ready to be \
            planted at any time! Please click the link below to book your favorite seedlings on our \
            website",
        link: "https://www.canopeum-pos.com",
        fully_sponsored: true,
    },
    DemoSite {
        name: "Maple Grove Retreat",
        is_public: true,
        site_type: 1,
        dms_latitude: "46°48'33.6\"N",
        dms_longitude: "71°18'40.0\"W",
        address: "123 Forest Trail, Quebec City, QC G1P 3X4",
        description: "Maple Grove Retreat is a serene escape nestled in the outskirts of Quebec \
            City, offering a lush forested area with scenic maple groves.",
        size: "1500",
        research_partnership: true,
        visitor_count: 300,
        email: "contact@maplegroveretreat.com",
        phone: "+1 (418) 555-1234",
        announcement: "Maple Grove Retreat is excited to announce our upcoming Maple Syrup \
            Festival! Join us on March 15th for a day of maple syrup tastings, nature hikes, and \
            family fun. Learn more on our website.",
        link: "https://www.maplegroveretreat.com/events/maple-syrup-festival",
        fully_sponsored: false,
    },
    DemoSite {
        name: "Lakeside Oasis",
        is_public: true,
        site_type: 2,
        dms_latitude: "48°36'05.0\"N",
        dms_longitude: "71°18'27.0\"W",
        address: "456 Lakeview Road, Lac-Saint-Jean, QC G8M 1R9",
        description: "Lakeside Oasis offers a tranquil retreat by the shores of Lac-Saint-Jean, \
            with pristine waters and breathtaking sunsets.",
        size: "800",
        research_partnership: false,
        visitor_count: 150,
        email: "info@lakesideoasis.com",
        phone: "+1 (418) 555-5678",
        announcement: "Escape to Lakeside Oasis! Our cozy cabins are now open for winter bookings. \
            Enjoy ice fishing, snowshoeing, and warm campfires by the lake. Book your stay today!",
        link: "https://www.lakesideoasis.com/winter-getaway",
        fully_sponsored: false,
    },
    DemoSite {
        name: "Evergreen Trail",
        is_public: false,
        site_type: 3,
        dms_latitude: "46°12'30.0\"N",
        dms_longitude: "74°35'30.0\"W",
        address: "789 Trailhead Way, Mont-Tremblant, QC J8E 1T7",
        description: "Evergreen Trail invites you to explore the rugged beauty of Mont-Tremblant's \
            wilderness, with winding trails and majestic evergreen forests.",
        size: "1200",
        research_partnership: true,
        visitor_count: 200,
        email: "explore@evergreentrail.com",
        phone: "+1 (819) 555-9876",
        announcement: "Discover the wonders of Evergreen Trail! Our guided nature walks are now \
            available every weekend. Immerse yourself in nature and learn about the diverse flora \
            and fauna of Mont-Tremblant.",
        link: "https://www.evergreentrail.com/guided-walks",
        fully_sponsored: false,
    },
];

struct Lookups {
    fertilizers: Vec<i64>,
    site_types: Vec<i64>,
    tree_types: Vec<i64>,
}

async fn insert_all(
    conn: &impl Connection,
    table: LookupTable,
    names: &[(&str, &str)],
) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(names.len());
    for (en, fr) in names {
        ids.push(insert(conn, table, en, fr).await?.id);
    }
    Ok(ids)
}

/// What a seeding run inserted.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub sites: usize,
    pub batches: usize,
    pub posts: usize,
}

/// Inserts demo data through a connection, drawing counts from its own RNG.
pub struct Seeder {
    rng: StdRng,
    sponsors: Vec<&'static str>,
}

impl Default for Seeder {
    fn default() -> Self {
        Seeder::new(StdRng::from_entropy())
    }
}

impl Seeder {
    pub fn new(rng: StdRng) -> Self {
        Seeder {
            rng,
            sponsors: SPONSOR_NAMES.to_vec(),
        }
    }

    /// Seed an empty database. `accounts` pairs each demo account with its
    /// password hash. Run inside a transaction.
    ///
    /// Returns `None` without touching anything if users already exist.
    pub async fn run(
        &mut self,
        conn: &impl Connection,
        accounts: &[(DemoAccount, String)],
    ) -> Result<Option<SeedReport>> {
        if user_count(conn).await? > 0 {
            tracing::info!("users already exist, skipping seed");
            return Ok(None);
        }

        let mut report = SeedReport::default();

        let lookups = Lookups {
            fertilizers: insert_all(conn, LookupTable::FertilizerType, FERTILIZER_TYPES).await?,
            site_types: insert_all(conn, LookupTable::SiteType, SITE_TYPES).await?,
            tree_types: insert_all(conn, LookupTable::TreeType, TREE_TYPES).await?,
        };
        insert_all(conn, LookupTable::MulchLayerType, MULCH_LAYER_TYPES).await?;

        let mut user_ids = Vec::with_capacity(accounts.len());
        for (account, password_hash) in accounts {
            let user = insert_user(
                conn,
                &NewUser {
                    username: account.username.to_string(),
                    email: account.email.to_string(),
                    password_hash: password_hash.clone(),
                    role: account.role,
                },
            )
            .await?;
            user_ids.push((account.email, user.id));
            report.users += 1;
        }
        let user_id = |email: &str| {
            user_ids
                .iter()
                .find(|(e, _)| *e == email)
                .map(|(_, id)| *id)
        };

        let mut canopeum_site = None;
        for demo in DEMO_SITES {
            let site_id = self.site(conn, demo, &lookups, &mut report).await?;
            if demo.name == "Canopeum" {
                canopeum_site = Some(site_id);
            }
        }

        if let Some(site_id) = canopeum_site {
            let post_id = self
                .post(
                    conn,
                    site_id,
                    "The season is officially started; new plants are starting to grow and our \
                     volunteers are very dedicated!",
                    Timestamp::now(),
                )
                .await?;
            report.posts += 1;
            for (email, body) in [
                ("tyrion@lannister.com", "Wow, I'm very excited to join the team!"),
                ("normal@user.com", "Thanks for helping our planet!"),
            ] {
                if let Some(author) = user_id(email) {
                    conn.traced()
                        .execute(
                            "INSERT INTO comment (post_id, user_id, body) VALUES ($1, $2, $3)",
                            &[&post_id, &author, &body],
                        )
                        .await?;
                }
            }
            for email in ["tyrion@lannister.com", "daenerys@targaryen.com"] {
                if let Some(admin) = user_id(email) {
                    grant_site_admin(conn, admin, site_id).await?;
                }
            }
        }

        tracing::info!(
            users = report.users,
            sites = report.sites,
            batches = report.batches,
            posts = report.posts,
            "seeded database"
        );
        Ok(Some(report))
    }

    async fn site(
        &mut self,
        conn: &impl Connection,
        demo: &DemoSite,
        lookups: &Lookups,
        report: &mut SeedReport,
    ) -> Result<i64> {
        let coordinate = Coordinate::with_address(demo.dms_latitude, demo.dms_longitude, demo.address)
            .map_err(|e| DbError::InvalidValue {
                column: "coordinate",
                message: e.to_string(),
            })?;
        let site = create_site(
            conn,
            &NewSite {
                name: demo.name.to_string(),
                is_public: demo.is_public,
                site_type_id: lookups.site_types.get(demo.site_type).copied(),
                coordinate,
                description: Some(demo.description.to_string()),
                size: Some(demo.size.to_string()),
                research_partnership: Some(demo.research_partnership),
                visible_map: Some(true),
                visitor_count: Some(demo.visitor_count),
                image_id: None,
                species: Vec::new(),
            },
        )
        .await?;
        report.sites += 1;

        if let Some(contact_id) = site.contact_id {
            update_contact(
                conn,
                site.id,
                contact_id,
                &ContactUpdate {
                    address: Some(demo.address.to_string()),
                    email: Some(demo.email.to_string()),
                    phone: Some(demo.phone.to_string()),
                    ..ContactUpdate::default()
                },
            )
            .await?;
        }
        update_announcement(conn, site.id, Some(demo.announcement), Some(demo.link)).await?;

        let mut site_species: Vec<(i64, i32)> = Vec::new();
        let batch_count = self.rng.gen_range(3..=BATCH_NAMES.len());
        for name in &BATCH_NAMES[..batch_count] {
            let species_count = self.rng.gen_range(4..=8);
            let tree_type_ids: Vec<i64> = lookups
                .tree_types
                .choose_multiple(&mut self.rng, species_count)
                .copied()
                .collect();
            let species: Vec<(i64, i32)> = tree_type_ids
                .into_iter()
                .map(|id| (id, self.rng.gen_range(1..=100)))
                .collect();
            let seeds = self.rng.gen_range(50..=200);

            let sponsor = self.take_sponsor().map(|name| SponsorInput {
                name: name.to_string(),
                url: Some("https://uilogos.co/".to_string()),
                logo_id: None,
            });
            insert_batch(
                conn,
                &NewBatch {
                    site_id: site.id,
                    name: name.to_string(),
                    sponsor,
                    size: Some(self.rng.gen_range(20..=150)),
                    soil_condition: Some("Good".to_string()),
                    survived_count: Some(self.rng.gen_range(100..=200)),
                    replace_count: Some(self.rng.gen_range(0..=50)),
                    total_propagation: Some(self.rng.gen_range(0..=seeds)),
                    image_id: None,
                    composition: Composition {
                        fertilizer_ids: Some(lookups.fertilizers.iter().take(1).copied().collect()),
                        species: Some(species.clone()),
                        ..Composition::default()
                    },
                },
            )
            .await?;
            report.batches += 1;

            for (tree_type_id, quantity) in species {
                let extra = if demo.fully_sponsored {
                    0
                } else {
                    self.rng.gen_range(0..=50)
                };
                match site_species.iter_mut().find(|(id, _)| *id == tree_type_id) {
                    Some((_, total)) => *total += quantity + extra,
                    None => site_species.push((tree_type_id, quantity + extra)),
                }
            }
        }
        replace_tree_species(conn, site.id, &site_species).await?;

        let now = Timestamp::now();
        for _ in 0..self.rng.gen_range(4..=8) {
            let body = format!(
                "{} has planted {} new trees today. Let's continue to grow our forest!",
                demo.name,
                self.rng.gen_range(100..=1000)
            );
            let age = SignedDuration::from_mins(self.rng.gen_range(0..=60 * 24 * 60));
            self.post(conn, site.id, &body, now - age).await?;
            report.posts += 1;
        }

        Ok(site.id)
    }

    async fn post(
        &mut self,
        conn: &impl Connection,
        site_id: i64,
        body: &str,
        created_at: Timestamp,
    ) -> Result<i64> {
        let share_count: i32 = self.rng.gen_range(0..=10);
        let row = conn
            .traced()
            .query_one(
                "INSERT INTO post (site_id, body, share_count, created_at) VALUES ($1, $2, $3, $4)
                 RETURNING id",
                &[&site_id, &body, &share_count, &created_at],
            )
            .await?;
        Ok(row.try_get("id")?)
    }

    fn take_sponsor(&mut self) -> Option<&'static str> {
        if self.sponsors.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.sponsors.len());
        Some(self.sponsors.swap_remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn demo_accounts_cover_every_role() {
        for role in Role::ALL {
            assert!(
                DEMO_ACCOUNTS.iter().any(|account| account.role == role),
                "no demo account for {role}"
            );
        }
    }

    #[test]
    fn demo_coordinates_parse() {
        for demo in DEMO_SITES {
            let coordinate =
                Coordinate::with_address(demo.dms_latitude, demo.dms_longitude, demo.address).unwrap();
            assert!(coordinate.dd_latitude > 45.0 && coordinate.dd_latitude < 49.0);
            assert!(coordinate.dd_longitude < -71.0 && coordinate.dd_longitude > -75.0);
        }
    }

    #[test]
    fn site_types_keep_pin_order() {
        assert_eq!(SITE_TYPES.len(), 6);
        assert_eq!(SITE_TYPES[0].0, "Canopeum");
        for demo in DEMO_SITES {
            assert!(demo.site_type < SITE_TYPES.len());
        }
    }

    #[test]
    fn sponsors_are_not_reused() {
        let mut seeder = Seeder::new(StdRng::seed_from_u64(7));
        let mut taken = Vec::new();
        while let Some(name) = seeder.take_sponsor() {
            assert!(!taken.contains(&name));
            taken.push(name);
        }
        assert_eq!(taken.len(), SPONSOR_NAMES.len());
    }
}
