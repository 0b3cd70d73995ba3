mod derivative;
