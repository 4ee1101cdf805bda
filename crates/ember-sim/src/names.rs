//! Fixed name pools for generated incidents.

pub const COMPANY_NAMES: &[&str] = &[
    "Dach Inc",
    "Schuster LLC",
    "Kirlin Group",
    "Kohler Group",
    "Ruelas S.L.",
    "Armenta S.L.",
    "Vega S.A.",
    "Delarosa S.A.",
    "Sarabia S.A.",
    "Torp - Reilly",
    "Heathcote Inc",
    "Swift - Bruen",
    "Stracke - Lemke",
    "Shields LLC",
    "Bruen Group",
    "Senger - Stehr",
    "Krogh - Eide",
    "Andresen BA",
    "Hagen - Holm",
    "Martinsen BA",
    "Holm BA",
    "Berg BA",
    "Fossum RFH",
    "Nordskaug - Torp",
    "Gran - Lunde",
    "Nordby BA",
    "Ryan Gruppen",
    "Karlsson AB",
    "Nilsson HB",
    "Karlsson Group",
    "Miller - Harber",
    "Yost Group",
    "Leuschke Group",
    "Mertz Group",
    "Welch LLC",
    "Baumbach Group",
    "Ward - Schmitt",
    "Romaguera Group",
    "Hickle - Kemmer",
    "Stewart Corp",
];

pub const INCIDENT_NAMES: &[&str] = &[
    "Cluster servers are down",
    "API performance degradation",
    "Customers unable to login",
    "Deployment failed",
    "Build failed",
    "Build timeout failure",
    "Server is unresponsive",
    "Server is crashing on start-up",
    "App crashes on start-up",
    "Provider is down",
    "Database is unresponsive",
    "Database servers are down",
    "Database replica lag",
    "LDAP fails to sync",
    "LDAP account unable to login",
    "Broken MFA process",
    "MFA fails to login users",
    "UI is unresponsive",
    "Security threat",
    "Security breach",
    "Customers data breach",
    "SLA broken",
    "MySQL max connections error",
    "Postgres max connections error",
    "Elastic Search unresponsive",
    "Posts deleted",
    "Mentions deleted",
    "Replies deleted",
    "Cloud server is down",
    "Cloud deployment failed",
    "Cloud provisioner is down",
    "Cloud running out of memory",
    "Unable to create new users",
    "Installations in crashloop",
    "Compliance report timeout",
    "Mobile app crash",
    "Mobile app out of memory",
    "Mobile app performance issues",
    "App fails to start",
    "HA cluster sync errors",
];
