//! Short or transliterated names as they come off a slip, mapped to the
//! canonical roster name. Keys are also used as match strings by the extractor.

pub const NAME_ALIASES: &[(&str, &str)] = &[
    ("Alex Sarr", "Alexandre Sarr"),
    ("Shai Gilgeous-Alex", "Shai Gilgeous-Alexander"),
    ("Jabari Smith", "Jabari Smith Jr."),
    ("Victor Wembanyan", "Victor Wembanyama"),
    ("Victor Wembanyam", "Victor Wembanyama"),
    ("Jaren Jackson", "Jaren Jackson Jr."),
    ("Tim Hardaway", "Tim Hardaway Jr."),
    ("Gary Trent", "Gary Trent Jr."),
    ("Kevin Porter", "Kevin Porter Jr."),
    ("Larry Nance", "Larry Nance Jr."),
    ("Karl-Anthony Town", "Karl-Anthony Towns"),
    ("Alperen Şengün", "Alperen Sengun"),
    ("Brandin Podziemsk", "Brandin Podziemski"),
    ("Giannis Antetokour", "Giannis Antetokounmpo"),
    ("Bogdan Bogdanovi", "Bogdan Bogdanović"),
    ("Guerschon Yabuse", "Guerschon Yabusele"),
    ("Ron Holland", "Ronald Holland II"),
    ("Simone Fontecchia", "Simone Fontecchio"),
    ("Bennedict Mathurir", "Bennedict Mathurin"),
    ("Haywood Highsmit", "Haywood Highsmith"),
    ("Dorian Finney-Smit", "Dorian Finney-Smith"),
    ("Nickeil Alexander-V", "Nickeil Alexander-Walker"),
    ("Kristaps Porziņgis", "Kristaps Porziņģis"),
    ("Trayce Jackson-Da", "Trayce Jackson-Davis"),
    ("Kentavious Caldwe", "Kentavious Caldwell-Pope"),
    ("Gary Payton", "Gary Payton II"),
    ("Ricky Council", "Ricky Council IV"),
    ("Nick Smith", "Nick Smith Jr."),
    ("Dereck Lively", "Dereck Lively II"),
    ("Andre Jackson", "Andre Jackson Jr."),
    ("Jaime Jaquez", "Jaime Jaquez Jr."),
    ("Kelly Oubre", "Kelly Oubre Jr."),
    ("Wendell Carter", "Wendell Carter Jr."),
    ("Trey Murphy", "Trey Murphy III"),
    ("Derrick Jones", "Derrick Jones Jr."),
    ("Scotty Pippen", "Scotty Pippen Jr."),
    ("Michael Porter", "Michael Porter Jr."),
    ("Dante Exum", "Danté Exum"),
    ("Tristan Vukčević", "Tristan Vukcevic"),
    ("Jakob Poeltl", "Jakob Pöltl"),
    ("Vince Williams", "Vince Williams Jr."),
    ("Sandro Mamukelas", "Sandro Mamukelashvili"),
    ("Jeff Dowtin", "Jeff Dowtin Jr."),
    ("Jalen Hood-Schifin", "Jalen Hood-Schifino"),
    // Missing from the roster feed. Listing them keeps the player count of an
    // image in step with its lines so the other bets on the slip still pair up.
    ("Bismack Biyombo", "Bismack Biyombo"),
    ("Markelle Fultz", "Markelle Fultz"),
    ("Damion Baugh", "Damion Baugh"),
    ("A.J. Lawson", "A.J. Lawson"),
];
